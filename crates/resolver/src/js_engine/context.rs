//! Context wrapper exposing only string evaluation.

use rquickjs::CatchResultExt;

use super::error::JsError;

/// A QuickJS context with no host bindings.
///
/// QuickJS ships no filesystem, process or network objects; nothing is
/// registered on top of the standard intrinsics, so evaluated code can only
/// compute and return values.
pub struct JsContext {
    ctx: rquickjs::Context,
}

impl JsContext {
    pub fn new(runtime: &rquickjs::Runtime) -> Result<Self, JsError> {
        let ctx = rquickjs::Context::full(runtime)
            .map_err(|e| JsError::setup("context", e))?;
        Ok(Self { ctx })
    }

    /// Evaluate `code` and require the completion value to be a string.
    pub fn eval_string(&self, code: &str) -> Result<String, JsError> {
        self.ctx.with(|ctx| {
            let value: rquickjs::Value = ctx
                .eval(code)
                .catch(&ctx)
                .map_err(convert_caught_error)?;
            match value.as_string() {
                Some(s) => Ok(s.to_string()?),
                None => Err(JsError::NotAString {
                    found: format!("{:?}", value.type_of()),
                }),
            }
        })
    }
}

fn convert_caught_error(caught: rquickjs::CaughtError<'_>) -> JsError {
    use rquickjs::CaughtError;
    match caught {
        CaughtError::Exception(exc) => {
            let msg = exc.message().unwrap_or_default();
            match exc.stack() {
                Some(stack) if !stack.is_empty() => JsError::thrown_with_stack(msg, stack),
                _ => JsError::thrown(msg),
            }
        }
        CaughtError::Value(val) => JsError::thrown(format!(
            "JS threw value: {:?}",
            val.as_string().and_then(|s| s.to_string().ok())
        )),
        CaughtError::Error(err) => JsError::from(err),
    }
}

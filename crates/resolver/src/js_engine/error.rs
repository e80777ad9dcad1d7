use thiserror::Error;

/// Failures raised while running a resolver script.
#[derive(Debug, Error)]
pub enum JsError {
    #[error("script engine setup failed at {stage}: {reason}")]
    Setup { stage: &'static str, reason: String },

    #[error("script failed: {message}{}", stack_suffix(.stack.as_deref()))]
    Script {
        message: String,
        stack: Option<String>,
    },

    #[error("script returned {found}, expected a string")]
    NotAString { found: String },

    #[error("script exceeded its time budget")]
    Interrupted,
}

fn stack_suffix(stack: Option<&str>) -> String {
    stack.map(|s| format!("\n{s}")).unwrap_or_default()
}

impl JsError {
    pub fn setup(stage: &'static str, reason: impl ToString) -> Self {
        Self::Setup {
            stage,
            reason: reason.to_string(),
        }
    }

    pub fn thrown(message: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
            stack: None,
        }
    }

    pub fn thrown_with_stack(message: impl Into<String>, stack: impl Into<String>) -> Self {
        Self::Script {
            message: message.into(),
            stack: Some(stack.into()),
        }
    }
}

impl From<rquickjs::Error> for JsError {
    fn from(err: rquickjs::Error) -> Self {
        Self::thrown(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_errors_append_the_stack() {
        let err = JsError::thrown_with_stack("boom", "at main (eval:1)");
        assert_eq!(err.to_string(), "script failed: boom\nat main (eval:1)");

        let err = JsError::thrown("boom");
        assert_eq!(err.to_string(), "script failed: boom");
    }

    #[test]
    fn setup_errors_name_the_stage() {
        let err = JsError::setup("runtime", "out of memory");
        assert_eq!(
            err.to_string(),
            "script engine setup failed at runtime: out of memory"
        );
    }
}

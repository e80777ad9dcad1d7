//! Sandboxed script execution on thread-local QuickJS runtimes.

use std::cell::RefCell;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::context::JsContext;
use super::error::JsError;

thread_local! {
    static THREAD_RUNTIME: RefCell<Option<rquickjs::Runtime>> = const { RefCell::new(None) };
}

/// Resource ceilings applied to every evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxLimits {
    /// Heap ceiling in bytes.
    pub memory_limit: usize,
    /// Native stack ceiling in bytes.
    pub max_stack_size: usize,
    /// Wall-clock budget for one evaluation.
    #[serde(with = "millis")]
    pub timeout: Duration,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            memory_limit: 32 * 1024 * 1024,
            max_stack_size: 512 * 1024,
            timeout: Duration::from_secs(2),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// Runs untrusted scripts under [`SandboxLimits`].
///
/// QuickJS runtimes are `!Send`, so one runtime is cached per thread and a
/// fresh context is created for every call. Callers on an async runtime
/// should go through `tokio::task::spawn_blocking`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsSandbox {
    limits: SandboxLimits,
}

impl JsSandbox {
    pub fn new(limits: SandboxLimits) -> Self {
        Self { limits }
    }

    fn with_runtime<F, T>(f: F) -> Result<T, JsError>
    where
        F: FnOnce(&rquickjs::Runtime) -> Result<T, JsError>,
    {
        THREAD_RUNTIME.with(|cell| {
            let mut slot = cell.borrow_mut();
            let runtime = match slot.take() {
                Some(runtime) => runtime,
                None => rquickjs::Runtime::new()
                    .map_err(|e| JsError::setup("runtime", e))?,
            };
            f(slot.insert(runtime))
        })
    }

    /// Execute `f` with a fresh context under this sandbox's limits.
    pub fn execute<F, T>(&self, f: F) -> Result<T, JsError>
    where
        F: FnOnce(&JsContext) -> Result<T, JsError>,
    {
        let limits = self.limits;
        Self::with_runtime(|runtime| {
            runtime.set_memory_limit(limits.memory_limit);
            runtime.set_max_stack_size(limits.max_stack_size);

            let deadline = Instant::now() + limits.timeout;
            runtime.set_interrupt_handler(Some(Box::new(move || Instant::now() >= deadline)));

            let result = JsContext::new(runtime).and_then(|ctx| f(&ctx));

            runtime.set_interrupt_handler(None);
            runtime.run_gc();

            match result {
                Err(e) if Instant::now() >= deadline => {
                    trace!(error = %e, "Script interrupted");
                    Err(JsError::Interrupted)
                }
                other => other,
            }
        })
    }

    /// Evaluate `code` and return its string completion value.
    pub fn eval_string(&self, code: &str) -> Result<String, JsError> {
        self.execute(|ctx| ctx.eval_string(code))
    }

    /// Drop this thread's cached runtime.
    pub fn clear_cache() {
        THREAD_RUNTIME.with(|cell| {
            *cell.borrow_mut() = None;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_string_results() {
        let sandbox = JsSandbox::default();
        assert_eq!(sandbox.eval_string("'a' + 1 + 2").unwrap(), "a12");
        // runtime is reused on the same thread
        assert_eq!(sandbox.eval_string("[1,2].join('-')").unwrap(), "1-2");
    }

    #[test]
    fn non_string_results_are_rejected() {
        let err = JsSandbox::default().eval_string("1 + 2").unwrap_err();
        assert!(matches!(err, JsError::NotAString { .. }));
    }

    #[test]
    fn thrown_errors_are_reported() {
        let err = JsSandbox::default()
            .eval_string("throw new Error('nope')")
            .unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn host_capabilities_are_absent() {
        let sandbox = JsSandbox::default();
        assert_eq!(
            sandbox
                .eval_string("[typeof require, typeof fetch, typeof XMLHttpRequest, typeof process].join()")
                .unwrap(),
            "undefined,undefined,undefined,undefined"
        );
    }

    #[test]
    fn runaway_scripts_are_interrupted() {
        let sandbox = JsSandbox::new(SandboxLimits {
            timeout: Duration::from_millis(50),
            ..SandboxLimits::default()
        });
        let err = sandbox.eval_string("while (true) {}").unwrap_err();
        assert!(matches!(err, JsError::Interrupted));

        // the cached runtime stays usable afterwards
        assert_eq!(sandbox.eval_string("'ok'").unwrap(), "ok");
    }

    #[test]
    fn clear_cache_recreates_runtime() {
        let sandbox = JsSandbox::default();
        sandbox.eval_string("'1'").unwrap();
        JsSandbox::clear_cache();
        assert_eq!(sandbox.eval_string("'2'").unwrap(), "2");
    }
}

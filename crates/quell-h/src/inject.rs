use chromiumoxide::Page;
use quell_engine::backend::BackendError;
use quell_engine::protocol::ScannerAction;
use quell_scanner::{SCANNER_JS, SCANNER_PROBE};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Upper bound on one evaluation. A blocking dialog would otherwise hang the
/// sweep task forever.
const EVAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum retries while the document is being replaced.
const MAX_CONTEXT_RETRIES: u32 = 10;

const CONTEXT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Why one in-page evaluation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    Timeout,
    /// The execution context went away mid-navigation; worth retrying.
    Context(String),
    Other(String),
}

impl EvalError {
    fn classify(message: impl fmt::Display) -> Self {
        let message = message.to_string();
        if is_context_error(&message) {
            EvalError::Context(message)
        } else {
            EvalError::Other(message)
        }
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Timeout => write!(f, "evaluation timed out, possibly blocked by a dialog"),
            EvalError::Context(message) | EvalError::Other(message) => f.write_str(message),
        }
    }
}

impl std::error::Error for EvalError {}

impl From<EvalError> for BackendError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::Timeout => BackendError::Timeout(EvalError::Timeout.to_string()),
            EvalError::Context(message) | EvalError::Other(message) => {
                BackendError::Scanner(message)
            }
        }
    }
}

fn is_context_error(err: &str) -> bool {
    err.contains("Cannot find context")
        || err.contains("Execution context was destroyed")
        || err.contains("-32000")
}

/// Run `operation` until it succeeds, fails for a reason other than a lost
/// context, or the retry budget is spent.
async fn retry_on_context_error<T, F, Fut>(label: &str, mut operation: F) -> Result<T, EvalError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EvalError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Err(EvalError::Context(message)) if attempt < MAX_CONTEXT_RETRIES => {
                tracing::debug!(
                    "{}: context lost (attempt {}/{}): {}",
                    label,
                    attempt,
                    MAX_CONTEXT_RETRIES,
                    message
                );
                tokio::time::sleep(CONTEXT_RETRY_DELAY).await;
            }
            result => return result,
        }
    }
}

/// Install the scanner in the current document unless it is already there.
pub async fn inject_scanner(page: &Page) -> Result<(), EvalError> {
    retry_on_context_error("scanner injection", || install_scanner(page)).await
}

async fn install_scanner(page: &Page) -> Result<(), EvalError> {
    if evaluate(page, SCANNER_PROBE).await?.as_bool() == Some(true) {
        return Ok(());
    }
    evaluate(page, SCANNER_JS).await?;
    tracing::debug!("Scanner installed");
    Ok(())
}

/// Run one scanner action and return its raw protocol response. Navigation
/// can drop the scanner between calls, so it is re-checked every attempt.
pub async fn execute_action(page: &Page, action: &ScannerAction) -> Result<Value, BackendError> {
    let expression = format!("window.Quell.process({})", serde_json::to_string(action)?);
    let expression = expression.as_str();
    tracing::trace!("Evaluating scanner action {}", action.name());

    let value = retry_on_context_error(action.name(), move || async move {
        install_scanner(page).await?;
        evaluate(page, expression).await
    })
    .await?;
    Ok(value)
}

async fn evaluate(page: &Page, expression: &str) -> Result<Value, EvalError> {
    match tokio::time::timeout(EVAL_TIMEOUT, page.evaluate(expression)).await {
        Err(_) => Err(EvalError::Timeout),
        Ok(Err(e)) => Err(EvalError::classify(e)),
        // Statements such as the scanner source evaluate to `undefined`.
        Ok(Ok(result)) => Ok(result.value().cloned().unwrap_or(Value::Null)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_errors_are_recognised() {
        assert!(matches!(
            EvalError::classify("Cannot find context with specified id"),
            EvalError::Context(_)
        ));
        assert!(matches!(
            EvalError::classify("Execution context was destroyed."),
            EvalError::Context(_)
        ));
        assert!(matches!(
            EvalError::classify("ReferenceError: foo is not defined"),
            EvalError::Other(_)
        ));
    }

    #[test]
    fn timeouts_map_to_backend_timeouts() {
        assert!(matches!(
            BackendError::from(EvalError::Timeout),
            BackendError::Timeout(_)
        ));
        assert!(matches!(
            BackendError::from(EvalError::Other("boom".into())),
            BackendError::Scanner(_)
        ));
    }

    #[tokio::test]
    async fn retry_stops_on_other_errors() {
        let mut calls = 0;
        let result: Result<(), _> = retry_on_context_error("probe", || {
            calls += 1;
            async { Err(EvalError::Other("boom".into())) }
        })
        .await;
        assert_eq!(result, Err(EvalError::Other("boom".into())));
        assert_eq!(calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_recovers_after_context_errors() {
        let mut calls = 0;
        let result = retry_on_context_error("probe", || {
            calls += 1;
            let call = calls;
            async move {
                if call < 3 {
                    Err(EvalError::classify("Cannot find context with specified id"))
                } else {
                    Ok(call)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_gives_up_after_budget() {
        let mut calls = 0;
        let result: Result<(), _> = retry_on_context_error("probe", || {
            calls += 1;
            async { Err(EvalError::classify("Execution context was destroyed.")) }
        })
        .await;
        assert!(matches!(result, Err(EvalError::Context(_))));
        assert_eq!(calls, MAX_CONTEXT_RETRIES);
    }
}

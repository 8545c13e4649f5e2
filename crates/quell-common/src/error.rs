use std::fmt;
use thiserror::Error;

/// Failures reported by a browser backend.
#[derive(Debug, Error)]
pub enum BackendError {
    // ============================================================
    // Navigation Errors
    // ============================================================
    #[error("Navigation failed: {0}")]
    Navigation(String),

    // ============================================================
    // Document / Frame Errors
    // ============================================================
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Frame {0} is not accessible")]
    FrameAccessDenied(String),

    #[error("Scanner execution failed: {0}")]
    Scanner(String),

    // ============================================================
    // Session Errors
    // ============================================================
    #[error("Backend not ready")]
    NotReady,

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Other: {0}")]
    Other(String),
}

/// Why an authentication attempt was judged to have failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    /// The login form never became actionable.
    LoginFormMissing,
    /// The application rendered its error indicator.
    Rejected { message: String },
    /// Neither the error indicator nor the admin chrome appeared.
    NoAdminMarker,
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthFailure::LoginFormMissing => write!(f, "login form missing"),
            AuthFailure::Rejected { message } => write!(f, "rejected: {}", message.trim()),
            AuthFailure::NoAdminMarker => write!(f, "admin interface did not load"),
        }
    }
}

/// Error taxonomy of the stabilization layer.
///
/// Only [`StabilizationError::is_fatal`] errors are returned from workflows by
/// default; the rest are logged where they occur and the workflow continues.
#[derive(Debug, Error)]
pub enum StabilizationError {
    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    #[error("Element not found for target {target}")]
    ElementNotFound { target: String },

    #[error("Frame {frame} is not accessible")]
    FrameAccessDenied { frame: String },

    #[error("Gave up waiting for {condition} after {attempts} attempts")]
    DetectionExhausted { condition: String, attempts: u32 },

    #[error("Overlay suppression step failed: {0}")]
    SuppressionTransientFailure(String),

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: AuthFailure },

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl StabilizationError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StabilizationError::UnknownTarget(_)
                | StabilizationError::AuthenticationFailed { .. }
                | StabilizationError::Backend(_)
        )
    }

    /// Stable classification, e.g. `authentication_failed: rejected: ...`.
    pub fn reason(&self) -> String {
        match self {
            StabilizationError::UnknownTarget(name) => format!("unknown_target: {}", name),
            StabilizationError::ElementNotFound { target } => {
                format!("element_not_found: {}", target)
            }
            StabilizationError::FrameAccessDenied { frame } => {
                format!("frame_access_denied: {}", frame)
            }
            StabilizationError::DetectionExhausted { condition, .. } => {
                format!("detection_exhausted: {}", condition)
            }
            StabilizationError::SuppressionTransientFailure(msg) => {
                format!("suppression_transient_failure: {}", msg)
            }
            StabilizationError::AuthenticationFailed { reason } => {
                format!("authentication_failed: {}", reason)
            }
            StabilizationError::Backend(e) => format!("backend: {}", e),
        }
    }
}

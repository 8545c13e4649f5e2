pub mod error;
pub mod protocol;
pub mod target;

pub use error::{AuthFailure, BackendError, StabilizationError};
pub use target::{
    ElementQuery, FrameScope, LogicalTarget, OverlaySignature, Pick, SelectorCandidate, UiVariant,
};

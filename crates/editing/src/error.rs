//! Edit precondition failures.
//!
//! None of these are fatal: the timeline is left unchanged and the caller
//! shows the message as a notice.

use montage_common::MontageError;
use montage_project_model::EntityId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error("no entity with id {0}")]
    NotFound(EntityId),

    #[error("split point {at} is outside ({start}, {end})")]
    InvalidSplitPoint { at: f64, start: f64, end: f64 },

    #[error("nothing to do")]
    NoOp,

    #[error("nothing is selected")]
    NoSelection,

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("already at the {0} of history")]
    AtBoundary(&'static str),

    #[error("{id} is not a {expected}")]
    WrongEntityKind { id: EntityId, expected: &'static str },
}

impl EditError {
    /// True for conditions the user caused by having nothing to act on.
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::NoOp | Self::AtBoundary(_))
    }
}

impl From<EditError> for MontageError {
    fn from(err: EditError) -> Self {
        MontageError::edit(err.to_string())
    }
}

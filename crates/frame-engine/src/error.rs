use frame_contracts::milestones::UnknownMilestone;
use thiserror::Error;

use crate::flow::AttemptState;

/// Everything that can go wrong inside one enhancement attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnhanceError {
    #[error(transparent)]
    UnknownMilestone(#[from] UnknownMilestone),
    #[error("Failed to upload source image: {0}")]
    UploadFailed(String),
    #[error("{message}")]
    BackendCallFailed { status: Option<u16>, message: String },
    #[error("{message}")]
    VendorCallFailed { status: Option<u16>, message: String },
    #[error("Unexpected API response format")]
    UnexpectedResponseShape,
}

impl EnhanceError {
    pub fn backend(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::BackendCallFailed {
            status,
            message: message.into(),
        }
    }

    pub fn vendor(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::VendorCallFailed {
            status,
            message: message.into(),
        }
    }

    /// HTTP status of the failed call, when the remote side answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BackendCallFailed { status, .. } | Self::VendorCallFailed { status, .. } => {
                *status
            }
            _ => None,
        }
    }
}

/// Rejected flow transitions. The controller state is unchanged when one of
/// these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("cannot generate from state {0}; a photo and a milestone must be selected")]
    NotReady(AttemptState),
    #[error("an enhancement attempt is already in flight")]
    Busy,
    #[error("retry is only available after a failed attempt (state is {0})")]
    NotFailed(AttemptState),
    #[error(transparent)]
    UnknownMilestone(#[from] UnknownMilestone),
    #[error("failed to start enhancement worker: {0}")]
    WorkerSpawn(String),
}

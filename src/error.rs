use thiserror::Error;

use crate::frame::Frame;
use crate::object::ObjectId;

#[derive(Debug, Error)]
pub enum RollbackError {
    #[error("{requested:?} is older than the retention window (oldest retained is {oldest:?})")]
    StaleFrame { requested: Frame, oldest: Frame },
    #[error("{requested:?} is ahead of the current frame {current:?}")]
    FutureFrame { requested: Frame, current: Frame },
    #[error("{0:?} is inside the retention window but was never recorded")]
    FrameNotRecorded(Frame),
    #[error("payload type `{0}` is already registered with this manager")]
    DuplicatePayload(&'static str),
    #[error("payload type `{0}` is not registered with this manager")]
    UnknownPayload(&'static str),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "parallel")]
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl RollbackError {
    /// True for the "cannot comply" outcomes of a restore request. The caller
    /// is expected to clamp or refuse the rollback, nothing is corrupted.
    pub fn is_not_performed(&self) -> bool {
        matches!(
            self,
            RollbackError::StaleFrame { .. }
                | RollbackError::FutureFrame { .. }
                | RollbackError::FrameNotRecorded(_)
        )
    }
}

/// Per-object failure raised by a restore strategy. Faults are logged and
/// counted, the rest of the restore proceeds.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RestoreFault {
    #[error("{object:?} references {referenced:?} which no longer resolves")]
    UnresolvedReference {
        object: ObjectId,
        referenced: ObjectId,
    },
    #[error("{object:?} rejected historical `{payload}`")]
    Rejected {
        object: ObjectId,
        payload: &'static str,
    },
}

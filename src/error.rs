use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Not supported by this device: {0}")]
    Unsupported(String),

    #[error("Alias requires {required} bytes but the aliased block only holds {available}")]
    AliasExceedsBlock { required: u64, available: u64 },

    #[error("Insufficient memory: {requested} bytes exceeds the maximum heap size of {max_heap_size}")]
    InsufficientMemory { requested: u64, max_heap_size: u64 },

    #[error("Native call {call} failed with code 0x{code:08x}")]
    Native { call: &'static str, code: i32 },

    #[error("Heap bookkeeping is corrupt: {0}")]
    InternalConsistency(String),
}

/// Coarse classification of an [`AllocError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    InsufficientMemory,
    NativeApiFailure,
    InternalConsistency,
}

impl AllocError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) | Self::Unsupported(_) | Self::AliasExceedsBlock { .. } => {
                ErrorKind::InvalidArgument
            }
            Self::InsufficientMemory { .. } => ErrorKind::InsufficientMemory,
            Self::Native { .. } => ErrorKind::NativeApiFailure,
            Self::InternalConsistency(_) => ErrorKind::InternalConsistency,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

// A convenient alias
pub type AllocResult<T> = Result<T, AllocError>;

use crate::error::{AllocError, AllocResult};

/// Flags controlling how a single allocation is satisfied.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AllocFlags {
    /// Always give the resource its own implicit heap.
    pub force_committed: bool,
    /// Never fall back to a committed resource; fail instead.
    pub force_not_committed: bool,
    /// Keep a small buffer out of the shared sub-buffer arenas.
    pub no_buffer_suballocation: bool,
    /// Evict rather than destroy on release (committed resources only).
    pub fast_release: bool,
}

impl AllocFlags {
    pub const NONE: Self = Self {
        force_committed: false,
        force_not_committed: false,
        no_buffer_suballocation: false,
        fast_release: false,
    };

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn force_committed(mut self) -> Self {
        self.force_committed = true;
        self
    }

    #[must_use]
    pub const fn force_not_committed(mut self) -> Self {
        self.force_not_committed = true;
        self
    }

    #[must_use]
    pub const fn no_buffer_suballocation(mut self) -> Self {
        self.no_buffer_suballocation = true;
        self
    }

    #[must_use]
    pub const fn fast_release(mut self) -> Self {
        self.fast_release = true;
        self
    }

    /// Reject contradictory combinations before any native call is made.
    ///
    /// # Errors
    /// `InvalidArgument` when both `force_committed` and `force_not_committed` are set.
    pub fn validate(self) -> AllocResult<()> {
        if self.force_committed && self.force_not_committed {
            return Err(AllocError::invalid(
                "ForceCommitted and ForceNotCommitted are mutually exclusive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn builder_sets_individual_flags() {
        let flags = AllocFlags::new().fast_release().no_buffer_suballocation();
        assert!(flags.fast_release);
        assert!(flags.no_buffer_suballocation);
        assert!(!flags.force_committed);
        assert!(flags.validate().is_ok());
    }

    #[test]
    fn force_flags_are_exclusive() {
        let err = AllocFlags::NONE
            .force_committed()
            .force_not_committed()
            .validate()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}

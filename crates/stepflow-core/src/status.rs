//! Transition outcomes.

use crate::error::FlowError;
use std::fmt;
use std::ops::BitOr;

/// Set of flags describing a transition outcome.
///
/// Combine flags with `|` and turn them into a [`Status`] with
/// [`Status::new`], which rejects contradictory combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatusFlags(u8);

impl StatusFlags {
    pub const SUCCESS: StatusFlags = StatusFlags(1);
    pub const FAILURE: StatusFlags = StatusFlags(1 << 1);
    pub const BLOCKED: StatusFlags = StatusFlags(1 << 2);
    pub const COMPLETED: StatusFlags = StatusFlags(1 << 3);
    pub const RESET: StatusFlags = StatusFlags(1 << 4);
    pub const VALID_FORM: StatusFlags = StatusFlags(1 << 5);
    pub const INVALID_FORM: StatusFlags = StatusFlags(1 << 6);
    pub const UNHANDLED_FORM: StatusFlags = StatusFlags(1 << 7);

    const NAMES: [(StatusFlags, &'static str); 8] = [
        (Self::SUCCESS, "SUCCESS"),
        (Self::FAILURE, "FAILURE"),
        (Self::BLOCKED, "BLOCKED"),
        (Self::COMPLETED, "COMPLETED"),
        (Self::RESET, "RESET"),
        (Self::VALID_FORM, "VALID_FORM"),
        (Self::INVALID_FORM, "INVALID_FORM"),
        (Self::UNHANDLED_FORM, "UNHANDLED_FORM"),
    ];

    /// Pairs that can never appear together.
    const EXCLUSIVE: [(StatusFlags, StatusFlags); 8] = [
        (Self::SUCCESS, Self::FAILURE),
        (Self::SUCCESS, Self::BLOCKED),
        (Self::SUCCESS, Self::INVALID_FORM),
        (Self::COMPLETED, Self::FAILURE),
        (Self::COMPLETED, Self::INVALID_FORM),
        (Self::VALID_FORM, Self::INVALID_FORM),
        (Self::VALID_FORM, Self::UNHANDLED_FORM),
        (Self::INVALID_FORM, Self::UNHANDLED_FORM),
    ];

    pub const fn empty() -> Self {
        StatusFlags(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: StatusFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    fn name(self) -> &'static str {
        Self::NAMES
            .iter()
            .find(|(flag, _)| *flag == self)
            .map_or("UNKNOWN", |(_, name)| *name)
    }
}

impl BitOr for StatusFlags {
    type Output = StatusFlags;

    fn bitor(self, rhs: StatusFlags) -> StatusFlags {
        StatusFlags(self.0 | rhs.0)
    }
}

impl fmt::Display for StatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

/// Immutable outcome of a transition.
///
/// # Examples
///
/// ```
/// use stepflow_core::{Status, StatusFlags};
///
/// let status = Status::new(StatusFlags::SUCCESS | StatusFlags::VALID_FORM)?;
/// assert!(status.is_successful());
/// assert!(status.is_form_valid());
/// assert_eq!(status.to_string(), "SUCCESS|VALID_FORM");
///
/// assert!(Status::new(StatusFlags::SUCCESS | StatusFlags::FAILURE).is_err());
/// # Ok::<(), stepflow_core::FlowError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status(StatusFlags);

impl Status {
    /// Creates a status from a flag combination.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidArgument`] naming the first pair of
    /// mutually exclusive flags found.
    pub fn new(flags: StatusFlags) -> Result<Self, FlowError> {
        for (a, b) in StatusFlags::EXCLUSIVE {
            if flags.contains(a) && flags.contains(b) {
                return Err(FlowError::InvalidArgument(format!(
                    "A transition status can not be {} and {} at the same time.",
                    a.name(),
                    b.name()
                )));
            }
        }
        Ok(Self(flags))
    }

    pub fn flags(&self) -> StatusFlags {
        self.0
    }

    pub fn contains(&self, flags: StatusFlags) -> bool {
        self.0.contains(flags)
    }

    pub fn is_successful(&self) -> bool {
        self.contains(StatusFlags::SUCCESS)
    }

    pub fn is_failed(&self) -> bool {
        self.contains(StatusFlags::FAILURE)
    }

    pub fn is_blocked(&self) -> bool {
        self.contains(StatusFlags::BLOCKED)
    }

    pub fn is_completed(&self) -> bool {
        self.contains(StatusFlags::COMPLETED)
    }

    pub fn is_reset(&self) -> bool {
        self.contains(StatusFlags::RESET)
    }

    pub fn is_form_valid(&self) -> bool {
        self.contains(StatusFlags::VALID_FORM)
    }

    pub fn is_form_invalid(&self) -> bool {
        self.contains(StatusFlags::INVALID_FORM)
    }

    pub fn is_unhandled_form(&self) -> bool {
        self.contains(StatusFlags::UNHANDLED_FORM)
    }
}

impl TryFrom<StatusFlags> for Status {
    type Error = FlowError;

    fn try_from(flags: StatusFlags) -> Result<Self, Self::Error> {
        Status::new(flags)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_combinations() {
        let combinations = [
            StatusFlags::SUCCESS | StatusFlags::VALID_FORM,
            StatusFlags::SUCCESS | StatusFlags::VALID_FORM | StatusFlags::COMPLETED,
            StatusFlags::SUCCESS | StatusFlags::RESET,
            StatusFlags::FAILURE | StatusFlags::INVALID_FORM,
            StatusFlags::FAILURE | StatusFlags::VALID_FORM | StatusFlags::BLOCKED,
            StatusFlags::FAILURE | StatusFlags::INVALID_FORM | StatusFlags::BLOCKED,
            StatusFlags::FAILURE,
            StatusFlags::UNHANDLED_FORM,
        ];
        for flags in combinations {
            assert!(Status::new(flags).is_ok(), "{} should be valid", flags);
        }
    }

    #[test]
    fn test_exclusive_combinations() {
        for (a, b) in StatusFlags::EXCLUSIVE {
            let err = Status::new(a | b).unwrap_err();
            assert!(matches!(err, FlowError::InvalidArgument(_)));
        }

        let err = Status::new(StatusFlags::COMPLETED | StatusFlags::FAILURE).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid argument: A transition status can not be COMPLETED and FAILURE at the same time."
        );
    }

    #[test]
    fn test_predicates() {
        let status =
            Status::new(StatusFlags::FAILURE | StatusFlags::VALID_FORM | StatusFlags::BLOCKED)
                .unwrap();
        assert!(status.is_failed());
        assert!(status.is_blocked());
        assert!(status.is_form_valid());
        assert!(!status.is_successful());
        assert!(!status.is_completed());
        assert!(!status.is_reset());
        assert!(!status.is_form_invalid());
        assert!(!status.is_unhandled_form());
    }

    #[test]
    fn test_equality_and_display() {
        let a = Status::new(StatusFlags::SUCCESS | StatusFlags::RESET).unwrap();
        let b = Status::try_from(StatusFlags::RESET | StatusFlags::SUCCESS).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "SUCCESS|RESET");
        assert_eq!(StatusFlags::empty().to_string(), "NONE");
    }
}

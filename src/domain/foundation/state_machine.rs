//! State machine trait for status enums.
//!
//! Gives every lifecycle status (registration status, payment status) the same
//! validated transition API.

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// Implementors list their legal edges once; `transition_to` and
/// `is_terminal` are derived from that table.
///
/// # Example
///
/// ```ignore
/// impl StateMachine for PaymentStatus {
///     fn can_transition_to(&self, target: &Self) -> bool {
///         matches!((self, target), (Pending, Completed) | (Pending, Failed))
///     }
///
///     fn valid_transitions(&self) -> Vec<Self> {
///         match self {
///             Pending => vec![Completed, Failed],
///             Completed | Failed => vec![],
///         }
///     }
/// }
///
/// let next = PaymentStatus::Pending.transition_to(PaymentStatus::Completed)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Ticket {
        Held,
        Issued,
        Voided,
    }

    impl StateMachine for Ticket {
        fn can_transition_to(&self, target: &Self) -> bool {
            use Ticket::*;
            matches!((self, target), (Held, Issued) | (Held, Voided))
        }

        fn valid_transitions(&self) -> Vec<Self> {
            use Ticket::*;
            match self {
                Held => vec![Issued, Voided],
                Issued | Voided => vec![],
            }
        }
    }

    #[test]
    fn transition_to_succeeds_for_listed_edge() {
        assert_eq!(Ticket::Held.transition_to(Ticket::Issued), Ok(Ticket::Issued));
    }

    #[test]
    fn transition_to_rejects_unlisted_edge() {
        let err = Ticket::Issued.transition_to(Ticket::Voided).unwrap_err();
        assert!(err.to_string().contains("Cannot transition from Issued to Voided"));
    }

    #[test]
    fn states_without_edges_are_terminal() {
        assert!(Ticket::Issued.is_terminal());
        assert!(Ticket::Voided.is_terminal());
        assert!(!Ticket::Held.is_terminal());
    }
}

//! Registration status state machine.
//!
//! ```text
//! Created ──► PendingPayment ──► Confirmed
//!    │              │
//!    └──────────────┴──────────► Cancelled
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{StateMachine, ValidationError};

/// Lifecycle status of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    /// Seat reserved, no payment method chosen yet.
    Created,

    /// Payment method chosen, waiting for the money.
    PendingPayment,

    /// Paid. Terminal.
    Confirmed,

    /// Abandoned, declined or cancelled. Terminal, seat returned.
    Cancelled,
}

impl RegistrationStatus {
    /// True while the registration is counted against session capacity.
    pub fn holds_seat(&self) -> bool {
        matches!(
            self,
            RegistrationStatus::Created | RegistrationStatus::PendingPayment
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Created => "created",
            RegistrationStatus::PendingPayment => "pending_payment",
            RegistrationStatus::Confirmed => "confirmed",
            RegistrationStatus::Cancelled => "cancelled",
        }
    }
}

impl StateMachine for RegistrationStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use RegistrationStatus::*;
        matches!(
            (self, target),
            (Created, PendingPayment)
                | (Created, Cancelled)
                | (PendingPayment, Confirmed)
                | (PendingPayment, Cancelled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use RegistrationStatus::*;
        match self {
            Created => vec![PendingPayment, Cancelled],
            PendingPayment => vec![Confirmed, Cancelled],
            Confirmed | Cancelled => vec![],
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(RegistrationStatus::Created),
            "pending_payment" => Ok(RegistrationStatus::PendingPayment),
            "confirmed" => Ok(RegistrationStatus::Confirmed),
            "cancelled" => Ok(RegistrationStatus::Cancelled),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown registration status '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use RegistrationStatus::*;

    const ALL: [RegistrationStatus; 4] = [Created, PendingPayment, Confirmed, Cancelled];

    fn rank(status: RegistrationStatus) -> u8 {
        match status {
            Created => 0,
            PendingPayment => 1,
            Confirmed | Cancelled => 2,
        }
    }

    #[test]
    fn confirmed_never_becomes_cancelled() {
        assert!(!Confirmed.can_transition_to(&Cancelled));
        assert!(Confirmed.transition_to(Cancelled).is_err());
    }

    #[test]
    fn terminal_states() {
        assert!(Confirmed.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(!Created.is_terminal());
        assert!(!PendingPayment.is_terminal());
    }

    #[test]
    fn created_cannot_jump_to_confirmed() {
        assert!(Created.transition_to(Confirmed).is_err());
    }

    #[test]
    fn valid_transitions_match_can_transition_to() {
        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(&to),
                    from.valid_transitions().contains(&to),
                    "{:?} -> {:?}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn only_live_states_hold_a_seat() {
        assert!(Created.holds_seat());
        assert!(PendingPayment.holds_seat());
        assert!(!Confirmed.holds_seat());
        assert!(!Cancelled.holds_seat());
    }

    #[test]
    fn parses_its_own_display() {
        for status in ALL {
            assert_eq!(status.to_string().parse::<RegistrationStatus>().unwrap(), status);
        }
    }

    proptest! {
        #[test]
        fn any_walk_is_monotonic(choices in proptest::collection::vec(0usize..4, 0..12)) {
            let mut current = Created;
            for choice in choices {
                let target = ALL[choice];
                match current.transition_to(target) {
                    Ok(next) => {
                        prop_assert!(rank(next) > rank(current));
                        current = next;
                    }
                    Err(_) => prop_assert!(!current.can_transition_to(&target)),
                }
            }
            if current == Confirmed {
                prop_assert!(current.transition_to(Cancelled).is_err());
            }
        }
    }
}

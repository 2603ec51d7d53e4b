//! TrainingSession aggregate entity.
//!
//! A training session is a scheduled, capacity-limited course run. The
//! aggregate owns the seat counters and the open/closed flag; the rules for
//! granting and returning a seat live here so that every store applies the
//! same check inside its own atomic step.
//!
//! # Design Decisions
//!
//! - **Money in cents**: prices are integer minor units, one per currency
//! - **One-way close**: `is_open` never flips back to true
//! - **Floored release**: returning a seat never drives the count below zero

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::foundation::{
    Currency, DomainError, ErrorCode, Money, Timestamp, TrainingSessionId, ValidationError,
};

use super::CapacityError;

/// Maximum length for course titles and locations.
pub const MAX_LABEL_LENGTH: usize = 300;

/// Largest seat count a session may offer.
pub const MAX_PARTICIPANTS: u32 = 100_000;

/// Everything an administrator supplies to schedule a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDetails {
    pub course_title: String,
    pub location: String,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub prices: Vec<Money>,
    pub max_participants: u32,
}

/// TrainingSession aggregate.
///
/// # Invariants
///
/// - `0 <= current_participants <= max_participants`
/// - `ends_at > starts_at`
/// - at most one price per currency, none negative
/// - once closed, stays closed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSession {
    id: TrainingSessionId,
    course_title: String,
    location: String,
    starts_at: Timestamp,
    ends_at: Timestamp,
    prices: BTreeMap<Currency, Money>,
    max_participants: u32,
    current_participants: u32,
    is_open: bool,
    created_at: Timestamp,
    closed_at: Option<Timestamp>,
}

impl TrainingSession {
    /// Schedules a new open session with no seats taken.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` for empty labels, a capacity outside
    ///   `1..=MAX_PARTICIPANTS`, inverted dates, missing, negative or
    ///   duplicated prices
    pub fn create(
        id: TrainingSessionId,
        details: SessionDetails,
        now: Timestamp,
    ) -> Result<Self, DomainError> {
        let course_title = validate_label("course_title", details.course_title)?;
        let location = validate_label("location", details.location)?;

        if details.max_participants == 0 {
            return Err(DomainError::validation(
                "max_participants",
                "A session needs at least one seat",
            ));
        }
        if details.max_participants > MAX_PARTICIPANTS {
            return Err(ValidationError::out_of_range(
                "max_participants",
                1,
                i64::from(MAX_PARTICIPANTS),
                i64::from(details.max_participants),
            )
            .into());
        }
        if !details.ends_at.is_after(&details.starts_at) {
            return Err(DomainError::validation(
                "ends_at",
                "Session must end after it starts",
            ));
        }
        if details.prices.is_empty() {
            return Err(DomainError::validation(
                "prices",
                "At least one price is required",
            ));
        }

        let mut prices = BTreeMap::new();
        for price in details.prices {
            if price.is_negative() {
                return Err(DomainError::validation(
                    "prices",
                    format!("Price in {} cannot be negative", price.currency()),
                ));
            }
            if prices.insert(price.currency(), price).is_some() {
                return Err(DomainError::validation(
                    "prices",
                    format!("Duplicate price for {}", price.currency()),
                ));
            }
        }

        Ok(Self {
            id,
            course_title,
            location,
            starts_at: details.starts_at,
            ends_at: details.ends_at,
            prices,
            max_participants: details.max_participants,
            current_participants: 0,
            is_open: true,
            created_at: now,
            closed_at: None,
        })
    }

    /// Reconstitutes a session from storage without validation.
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: TrainingSessionId,
        course_title: String,
        location: String,
        starts_at: Timestamp,
        ends_at: Timestamp,
        prices: BTreeMap<Currency, Money>,
        max_participants: u32,
        current_participants: u32,
        is_open: bool,
        created_at: Timestamp,
        closed_at: Option<Timestamp>,
    ) -> Self {
        Self {
            id,
            course_title,
            location,
            starts_at,
            ends_at,
            prices,
            max_participants,
            current_participants,
            is_open,
            created_at,
            closed_at,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> TrainingSessionId {
        self.id
    }

    pub fn course_title(&self) -> &str {
        &self.course_title
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn starts_at(&self) -> Timestamp {
        self.starts_at
    }

    pub fn ends_at(&self) -> Timestamp {
        self.ends_at
    }

    pub fn prices(&self) -> &BTreeMap<Currency, Money> {
        &self.prices
    }

    pub fn max_participants(&self) -> u32 {
        self.max_participants
    }

    pub fn current_participants(&self) -> u32 {
        self.current_participants
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn closed_at(&self) -> Option<Timestamp> {
        self.closed_at
    }

    /// Seats still available.
    pub fn seats_remaining(&self) -> u32 {
        self.max_participants.saturating_sub(self.current_participants)
    }

    /// Pre-tax price in the given currency, if the session is sold in it.
    pub fn price_for(&self, currency: Currency) -> Option<Money> {
        self.prices.get(&currency).copied()
    }

    /// True once the session's end time is strictly in the past.
    pub fn has_ended(&self, now: Timestamp) -> bool {
        self.ends_at.is_before(&now)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Capacity
    // ─────────────────────────────────────────────────────────────────────────

    /// Checks the open flag and free seats, then takes one seat.
    ///
    /// Callers must run this inside the store's per-session atomic step.
    pub fn try_reserve(&mut self) -> Result<(), CapacityError> {
        if !self.is_open {
            return Err(CapacityError::session_closed(self.id));
        }
        if self.current_participants >= self.max_participants {
            return Err(CapacityError::session_full(self.id));
        }
        self.current_participants += 1;
        Ok(())
    }

    /// Returns one seat to the pool. Returns false if the count was already 0.
    pub fn release(&mut self) -> bool {
        if self.current_participants == 0 {
            return false;
        }
        self.current_participants -= 1;
        true
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Open / closed
    // ─────────────────────────────────────────────────────────────────────────

    /// Closes the session. Returns false if it was already closed.
    pub fn close(&mut self, now: Timestamp) -> bool {
        if !self.is_open {
            return false;
        }
        self.is_open = false;
        self.closed_at = Some(now);
        true
    }

    /// Closes the session if its end time has passed.
    pub fn close_if_ended(&mut self, now: Timestamp) -> bool {
        self.has_ended(now) && self.close(now)
    }

    /// Fails with `SessionClosed` when the session is not accepting learners.
    pub fn ensure_open(&self) -> Result<(), DomainError> {
        if self.is_open {
            Ok(())
        } else {
            Err(DomainError::new(
                ErrorCode::SessionClosed,
                CapacityError::session_closed(self.id).message(),
            ))
        }
    }
}

fn validate_label(field: &str, value: String) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, format!("{} cannot be empty", field)));
    }
    if trimmed.len() > MAX_LABEL_LENGTH {
        return Err(DomainError::validation(
            field,
            format!("{} exceeds {} characters", field, MAX_LABEL_LENGTH),
        ));
    }
    Ok(trimmed.to_string())
}

//! Clinical event model

use crate::utils::date::Day;

/// A dated clinical event (diagnosis, procedure, referral...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event type code used by the cohort definitions
    pub event_type: String,
    /// Day of the event
    pub date: Day,
    /// Optional free-text or source code
    pub code: Option<String>,
}

impl Event {
    /// Create a new event without a source code
    #[must_use]
    pub fn new(event_type: impl Into<String>, date: Day) -> Self {
        Self {
            event_type: event_type.into(),
            date,
            code: None,
        }
    }

    /// Attach a source code
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Whether the event type is one of `types`
    #[must_use]
    pub fn is_any_of(&self, types: &[String]) -> bool {
        types.iter().any(|t| t == &self.event_type)
    }
}

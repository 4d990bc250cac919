use super::member::MemberId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type IntervalId = i64;

/// One punch-in / punch-out period of a member.
///
/// `punch_out == None` means the interval is still open (member on break).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub id: IntervalId,                    // ⇔ intervals.id (assigned by storage)
    pub member_id: MemberId,               // ⇔ intervals.member_id
    pub punch_in: DateTime<Utc>,           // ⇔ intervals.punch_in_ms
    pub punch_out: Option<DateTime<Utc>>,  // ⇔ intervals.punch_out_ms (NULL = open)
    pub created_at: DateTime<Utc>,         // ⇔ intervals.created_at_ms
    #[serde(default)]
    pub member_name: Option<String>,       // identity snapshot taken at creation
    #[serde(default)]
    pub member_email: Option<String>,
}

impl Interval {
    pub fn is_open(&self) -> bool {
        self.punch_out.is_none()
    }

    /// A closed interval never ends before it starts.
    pub fn is_well_formed(&self) -> bool {
        self.punch_out.is_none_or(|out| out >= self.punch_in)
    }

    /// Copy of this interval closed at `at`.
    pub fn closed_at(&self, at: DateTime<Utc>) -> Self {
        Self {
            punch_out: Some(at),
            ..self.clone()
        }
    }
}

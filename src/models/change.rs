use super::interval::Interval;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    /// Convert enum → DB string
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }

    /// Convert DB string → enum
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "insert" => Some(ChangeKind::Insert),
            "update" => Some(ChangeKind::Update),
            "delete" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

/// Out-of-band notification describing a remote write on an interval.
/// May arrive out of order and more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub interval: Interval,
}

impl ChangeEvent {
    pub fn insert(interval: Interval) -> Self {
        Self {
            kind: ChangeKind::Insert,
            interval,
        }
    }

    pub fn update(interval: Interval) -> Self {
        Self {
            kind: ChangeKind::Update,
            interval,
        }
    }

    pub fn delete(interval: Interval) -> Self {
        Self {
            kind: ChangeKind::Delete,
            interval,
        }
    }
}

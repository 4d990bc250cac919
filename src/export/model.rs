// src/export/model.rs

use crate::core::clock::format_hms;
use crate::core::report::ReportRow;
use crate::utils::zone::DisplayZone;
use serde::{Deserialize, Serialize};

/// A column of the export table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportColumn {
    Name,
    Email,
    #[serde(rename = "Punch In")]
    PunchIn,
    #[serde(rename = "Punch Out")]
    PunchOut,
    #[serde(rename = "Created At")]
    CreatedAt,
    Duration,
}

impl ReportColumn {
    /// `Name,Email,Punch In,Punch Out,Created At`
    pub fn default_set() -> Vec<ReportColumn> {
        vec![
            ReportColumn::Name,
            ReportColumn::Email,
            ReportColumn::PunchIn,
            ReportColumn::PunchOut,
            ReportColumn::CreatedAt,
        ]
    }

    pub fn header(&self) -> &'static str {
        match self {
            ReportColumn::Name => "Name",
            ReportColumn::Email => "Email",
            ReportColumn::PunchIn => "Punch In",
            ReportColumn::PunchOut => "Punch Out",
            ReportColumn::CreatedAt => "Created At",
            ReportColumn::Duration => "Duration",
        }
    }

    pub fn cell(&self, row: &ReportRow, zone: &DisplayZone) -> String {
        match self {
            ReportColumn::Name => row.name.clone(),
            ReportColumn::Email => row.email.clone(),
            ReportColumn::PunchIn => zone.format_timestamp(row.punch_in),
            ReportColumn::PunchOut => row
                .punch_out
                .map(|t| zone.format_timestamp(t))
                .unwrap_or_default(),
            ReportColumn::CreatedAt => zone.format_timestamp(row.created_at),
            ReportColumn::Duration => format_hms(row.duration),
        }
    }
}

/// Flat structure for JSON export.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct IntervalExport {
    pub interval_id: i64,
    pub member_id: i64,
    pub name: String,
    pub email: String,
    pub punch_in: String,
    pub punch_out: Option<String>,
    pub created_at: String,
    pub duration_seconds: i64,
    pub duration: String,
}

impl IntervalExport {
    pub fn from_row(row: &ReportRow, zone: &DisplayZone) -> Self {
        Self {
            interval_id: row.interval_id,
            member_id: row.member_id,
            name: row.name.clone(),
            email: row.email.clone(),
            punch_in: zone.format_timestamp(row.punch_in),
            punch_out: row.punch_out.map(|t| zone.format_timestamp(t)),
            created_at: zone.format_timestamp(row.created_at),
            duration_seconds: row.duration.num_seconds(),
            duration: format_hms(row.duration),
        }
    }
}

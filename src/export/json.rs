use crate::core::report::ReportRow;
use crate::errors::AppResult;
use crate::export::model::IntervalExport;
use crate::utils::zone::DisplayZone;

/// Render rows as a pretty-printed JSON array.
pub fn render_json(rows: &[ReportRow], zone: &DisplayZone) -> AppResult<String> {
    let flat: Vec<IntervalExport> = rows
        .iter()
        .map(|r| IntervalExport::from_row(r, zone))
        .collect();
    Ok(serde_json::to_string_pretty(&flat)?)
}

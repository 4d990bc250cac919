// src/export/logic.rs

use crate::core::clock::Clock;
use crate::core::ports::{ChangeNotifier, Persistence};
use crate::core::session::Session;
use crate::errors::AppResult;
use crate::export::fs_utils::ensure_writable;
use crate::export::model::ReportColumn;
use crate::export::range::window_for;
use crate::export::{ExportFormat, notify_export_success, render_csv, render_json};
use crate::ui::messages::warning;
use crate::utils::zone::DisplayZone;
use std::fs;
use std::path::Path;

/// High-level export flow.
pub struct ExportLogic;

pub struct ExportRequest<'a> {
    pub format: ExportFormat,
    pub file: &'a Path,
    pub range: Option<&'a str>,
    pub columns: &'a [ReportColumn],
    pub zone: DisplayZone,
    pub force: bool,
}

impl ExportLogic {
    /// Build the report for the requested range and write it out.
    /// Returns the number of rows written.
    pub async fn export<P, N, C>(
        session: &Session<P, N, C>,
        req: &ExportRequest<'_>,
    ) -> AppResult<usize>
    where
        P: Persistence,
        N: ChangeNotifier,
        C: Clock,
    {
        ensure_writable(req.file, req.force)?;

        let window = window_for(req.range, &req.zone, session.now())?;
        let rows = session.report(&window).await?;

        if rows.is_empty() {
            warning("No intervals found for selected range.");
        }

        let content = match req.format {
            ExportFormat::Csv => render_csv(&rows, req.columns, &req.zone)?,
            ExportFormat::Json => render_json(&rows, &req.zone)?,
        };
        fs::write(req.file, content)?;

        notify_export_success(&req.format.as_str().to_uppercase(), rows.len(), req.file);
        Ok(rows.len())
    }
}

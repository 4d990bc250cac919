use crate::core::report::ReportRow;
use crate::errors::{AppError, AppResult};
use crate::export::model::ReportColumn;
use crate::utils::zone::DisplayZone;
use csv::{QuoteStyle, Terminator, WriterBuilder};

/// Render rows as CSV.
///
/// Bare header line, then one line per row with every field double-quoted
/// (internal quotes doubled). Lines end with `\n`.
pub fn render_csv(
    rows: &[ReportRow],
    columns: &[ReportColumn],
    zone: &DisplayZone,
) -> AppResult<String> {
    let header: Vec<&str> = columns.iter().map(|c| c.header()).collect();
    let mut buf = header.join(",").into_bytes();
    buf.push(b'\n');

    {
        let mut wtr = WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(&mut buf);

        for row in rows {
            wtr.write_record(columns.iter().map(|c| c.cell(row, zone)))?;
        }
        wtr.flush()?;
    }

    String::from_utf8(buf).map_err(|e| AppError::Export(format!("CSV is not valid UTF-8: {}", e)))
}

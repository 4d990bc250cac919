use crate::cli::commands::{open_backend, open_session};
use crate::cli::parser::Commands;
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::export::ExportLogic;
use crate::export::logic::ExportRequest;
use std::path::Path;

pub async fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Export {
        format,
        file,
        range,
        force,
    } = cmd
    {
        let path = Path::new(file);
        if !path.is_absolute() {
            return Err(AppError::Export(format!(
                "Output file path must be absolute: {file}"
            )));
        }

        let backend = open_backend(cfg)?;
        let mut session = open_session(cfg, &backend).await?;

        let req = ExportRequest {
            format: *format,
            file: path,
            range: range.as_deref(),
            columns: &cfg.export_columns,
            zone: cfg.display_zone()?,
            force: *force,
        };
        let result = ExportLogic::export(&session, &req).await;

        session.close();
        result?;
    }
    Ok(())
}

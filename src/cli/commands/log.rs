use crate::cli::commands::open_backend;
use crate::cli::parser::Commands;
use crate::config::Config;
use crate::errors::AppResult;
use crate::utils::table::Table;

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Log { print: true, limit } = cmd {
        let backend = open_backend(cfg)?;
        let rows = backend.log_entries(*limit)?;

        if rows.is_empty() {
            println!("Internal log is empty.");
            return Ok(());
        }

        let mut table = Table::new(vec!["ID", "Date", "Operation", "Target", "Message"]);
        for r in rows {
            table.add_row(vec![r.id.to_string(), r.date, r.operation, r.target, r.message]);
        }
        print!("{}", table.render());
    }

    Ok(())
}

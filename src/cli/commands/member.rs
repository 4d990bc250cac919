use crate::cli::commands::open_backend;
use crate::cli::parser::{Commands, MemberAction};
use crate::config::Config;
use crate::errors::AppResult;
use crate::ui::messages::{business, success};
use crate::utils::table::Table;
use chrono::Utc;

/// Roster management: thin wrapper over the backend.
pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    let Commands::Member { action } = cmd else {
        return Ok(());
    };
    let backend = open_backend(cfg)?;

    let outcome = match action {
        MemberAction::Add { name, email, admin } => backend
            .add_member(name, email.as_deref(), *admin)
            .map(|m| success(format!("Added member {} (id {}).", m.name, m.id))),

        MemberAction::List => backend.members().map(|members| {
            if members.is_empty() {
                println!("No members.");
                return;
            }
            let mut table = Table::new(vec!["ID", "Name", "Email", "Admin"]);
            for m in members {
                table.add_row(vec![
                    m.id.to_string(),
                    m.name.clone(),
                    m.email_str().to_string(),
                    if m.is_admin { "yes".into() } else { "no".into() },
                ]);
            }
            print!("{}", table.render());
        }),

        MemberAction::Remove { id } => backend
            .remove_member(*id, Utc::now())
            .map(|m| success(format!("Removed member {} (id {}).", m.name, m.id))),
    };

    match outcome {
        Err(e) if e.is_business() => {
            business(&e);
            Ok(())
        }
        other => other,
    }
}

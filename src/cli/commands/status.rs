use crate::cli::commands::{open_backend, open_session};
use crate::config::Config;
use crate::core::clock::format_hms;
use crate::errors::AppResult;
use crate::utils::table::Table;

/// Presence of every member, with live break duration.
pub async fn handle(cfg: &Config) -> AppResult<()> {
    let zone = cfg.display_zone()?;
    let backend = open_backend(cfg)?;
    let mut session = open_session(cfg, &backend).await?;

    let members = backend.members()?;
    if members.is_empty() {
        println!("No members.");
        session.close();
        return Ok(());
    }

    let now = session.now();
    let mut table = Table::new(vec!["ID", "Name", "Status", "Since", "Elapsed"]);
    for m in &members {
        let open = session.open_interval_for(m.id);
        table.add_row(vec![
            m.id.to_string(),
            m.name.clone(),
            session.presence_of(m.id).label().to_string(),
            open.map(|iv| zone.format_timestamp(iv.punch_in))
                .unwrap_or_else(|| "--".into()),
            session
                .elapsed_for(m.id, now)
                .map(format_hms)
                .unwrap_or_else(|| "--".into()),
        ]);
    }
    print!("{}", table.render());

    let on_break = members
        .iter()
        .filter(|m| session.presence_of(m.id).is_on_break())
        .count();
    println!("\n{} of {} on break", on_break, members.len());

    session.close();
    Ok(())
}

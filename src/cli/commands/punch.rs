use crate::cli::commands::{open_backend, open_session};
use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::clock::format_hms;
use crate::errors::AppResult;
use crate::ui::messages::{back, business, on_break};

/// Handle `in` / `out`.
///
/// Already-on-break and nothing-to-close are reported, not failed.
pub async fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    let (key, punching_in) = match cmd {
        Commands::PunchIn { member } => (member, true),
        Commands::PunchOut { member } => (member, false),
        _ => return Ok(()),
    };

    let zone = cfg.display_zone()?;
    let backend = open_backend(cfg)?;

    let member = match backend.find_member(key) {
        Ok(m) => m,
        Err(e) if e.is_business() => {
            business(&e);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let mut session = open_session(cfg, &backend).await?;

    let result = if punching_in {
        session.punch_in(member.id).await.map(|iv| {
            on_break(format!(
                "{} started a break at {}.",
                member.name,
                zone.format_timestamp(iv.punch_in)
            ))
        })
    } else {
        session.punch_out(member.id).await.map(|iv| {
            let reference = iv.punch_out.unwrap_or(iv.punch_in);
            back(format!(
                "{} is back at {} (break {}).",
                member.name,
                zone.format_timestamp(reference),
                format_hms(crate::core::clock::elapsed(&iv, reference))
            ))
        })
    };

    session.close();

    match result {
        Err(e) if e.is_business() => {
            business(&e);
            Ok(())
        }
        other => other,
    }
}

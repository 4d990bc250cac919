use crate::cli::commands::{CliSession, open_backend, open_session};
use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::clock::{format_hm, format_hms};
use crate::core::reconciler::Applied;
use crate::core::session::SessionUpdate;
use crate::errors::AppResult;
use crate::models::{ChangeKind, Member};
use crate::ui::messages::{business, info, warning};
use crate::utils::zone::DisplayZone;
use chrono::{DateTime, Utc};

/// Follow the change feed, refreshing live durations on every tick.
pub async fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    let Commands::Watch { updates } = cmd else {
        return Ok(());
    };

    let zone = cfg.display_zone()?;
    let backend = open_backend(cfg)?;
    let mut session = open_session(cfg, &backend).await?;
    session.start_ticker(cfg.tick_period());

    info("Watching for changes (Ctrl-C to stop)…");
    let mut members = backend.members()?;
    let mut seen = 0usize;

    let result = loop {
        if updates.is_some_and(|limit| seen >= limit) {
            break Ok(());
        }

        let update = tokio::select! {
            update = session.next_update() => update,
            _ = tokio::signal::ctrl_c() => break Ok(()),
        };
        seen += 1;

        match update {
            Ok(SessionUpdate::Change { event, applied }) => {
                if applied == Applied::Changed {
                    if !members.iter().any(|m| m.id == event.interval.member_id)
                        && let Ok(fresh) = backend.members()
                    {
                        members = fresh;
                    }
                    print_change(&members, event.kind, &event.interval, &zone);
                }
            }
            Ok(SessionUpdate::Tick(now)) => print_on_break(&session, &members, now),
            Ok(SessionUpdate::FeedLost) => warning("Change feed lost, resynchronizing…"),
            Ok(SessionUpdate::Resynced(n)) => info(format!("Resynchronized ({} intervals).", n)),
            Ok(SessionUpdate::RecoveryFailed { error, retry_in }) => warning(format!(
                "Resynchronization failed ({}), retrying in {:.1}s…",
                error,
                retry_in.as_secs_f64()
            )),
            Ok(SessionUpdate::Closed) => break Ok(()),
            Err(e) if e.is_business() || e.is_transport() => business(&e),
            Err(e) => break Err(e),
        }
    };

    session.close();
    result
}

fn member_name(members: &[Member], interval: &crate::models::Interval) -> String {
    members
        .iter()
        .find(|m| m.id == interval.member_id)
        .map(|m| m.name.clone())
        .or_else(|| interval.member_name.clone())
        .unwrap_or_else(|| format!("member {}", interval.member_id))
}

fn print_change(
    members: &[Member],
    kind: ChangeKind,
    interval: &crate::models::Interval,
    zone: &DisplayZone,
) {
    let name = member_name(members, interval);
    match (kind, interval.punch_out) {
        (ChangeKind::Delete, _) => println!("🗑️  {}: interval {} removed", name, interval.id),
        (_, None) => println!(
            "☕ {} started a break at {}",
            name,
            zone.format_timestamp(interval.punch_in)
        ),
        (_, Some(out)) => println!(
            "🟢 {} is back at {} (break {})",
            name,
            zone.format_timestamp(out),
            format_hm(out - interval.punch_in)
        ),
    }
}

fn print_on_break(session: &CliSession, members: &[Member], now: DateTime<Utc>) {
    let on_break: Vec<String> = session
        .store()
        .open_intervals()
        .into_iter()
        .map(|iv| {
            format!(
                "{} {}",
                member_name(members, iv),
                format_hms(crate::core::clock::elapsed(iv, now))
            )
        })
        .collect();

    if on_break.is_empty() {
        println!("⏱️  nobody on break");
    } else {
        println!("⏱️  on break: {}", on_break.join(", "));
    }
}

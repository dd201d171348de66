//! `claude-guard stats` command implementation.

use crate::cli::{format_count, format_local_time, load, project_name, short_id};
use crate::core::stats::{
    Period, Pricing, Usage, get_daily_breakdown, get_period_stats, get_recent_sessions_with_stats,
    get_session_stats, get_total_stats,
};
use crate::error::{Error, Result};
use crate::storage::Database;
use chrono::{DateTime, Utc};

/// Recent sessions listed under the totals.
const RECENT_SESSIONS: usize = 5;

/// Run the stats command.
///
/// `--session` wins over `--period`, which wins over `--daily`; with none
/// of them, all-time totals and the most recent sessions are shown.
///
/// # Errors
///
/// Returns an error if the config or store cannot be opened, the session
/// is not found, or `--daily` asks for zero days.
pub fn run(session: Option<&str>, period: Option<Period>, daily: Option<u32>) -> Result<()> {
    if daily == Some(0) {
        return Err(Error::InvalidArgument("--daily needs at least one day".to_string()));
    }
    let (config, store) = load()?;
    let db = Database::new(&store);
    let pricing = Pricing::new(&config.pricing);
    let now = Utc::now();

    let report = match (session, period, daily) {
        (Some(id), _, _) => render_session(db, id, &pricing)?,
        (None, Some(period), _) => render_period(db, period, now, &pricing),
        (None, None, Some(days)) => render_daily(db, days, now, &pricing),
        (None, None, None) => render_totals(db, &pricing),
    };
    println!("{report}");
    Ok(())
}

fn usage_lines(usage: &Usage) -> Vec<String> {
    vec![
        format!("Total Turns: {}", usage.stats.turns),
        format!("Input Tokens: {}", format_count(usage.stats.input_tokens)),
        format!("Output Tokens: {}", format_count(usage.stats.output_tokens)),
        format!("Total Tokens: {}", format_count(usage.stats.total_tokens())),
        format!("Estimated Cost: ${:.4}", usage.cost_usd),
    ]
}

fn render_session(db: Database<'_>, id_or_prefix: &str, pricing: &Pricing) -> Result<String> {
    let stats = get_session_stats(db, id_or_prefix, pricing)
        .ok_or_else(|| Error::SessionNotFound(id_or_prefix.to_string()))?;
    let session = &stats.session;

    let mut lines = vec![
        "=== Session Stats ===".to_string(),
        String::new(),
        format!("Session ID: {}", session.id),
        format!(
            "Project: {}",
            if session.project_path.is_empty() {
                "N/A"
            } else {
                session.project_path.as_str()
            }
        ),
        format!("Status: {}", session.status),
        format!("Started: {}", format_local_time(session.started_at)),
    ];
    if let Some(ended_at) = session.ended_at {
        lines.push(format!("Ended: {}", format_local_time(ended_at)));
    }
    if let Some(model) = &stats.model {
        lines.push(format!("Model: {model}"));
    }
    lines.push(String::new());
    lines.extend(usage_lines(&stats.usage));
    Ok(lines.join("\n"))
}

fn render_period(
    db: Database<'_>,
    period: Period,
    now: DateTime<Utc>,
    pricing: &Pricing,
) -> String {
    let stats = get_period_stats(db, period, now, pricing);
    let mut lines = vec![
        format!("=== Stats: {} ===", stats.period.as_str()),
        String::new(),
        format!("Sessions: {}", stats.usage.stats.sessions),
    ];
    lines.extend(usage_lines(&stats.usage));
    lines.join("\n")
}

fn render_daily(db: Database<'_>, days: u32, now: DateTime<Utc>, pricing: &Pricing) -> String {
    let mut lines = vec![
        format!("=== Daily Breakdown (Last {days} days) ==="),
        String::new(),
        "Date       | Turns | Input      | Output     | Total      | Cost".to_string(),
        "-----------|-------|------------|------------|------------|---------".to_string(),
    ];
    for day in get_daily_breakdown(db, days, now, pricing) {
        let stats = day.usage.stats;
        lines.push(format!(
            "{} | {:>5} | {:>10} | {:>10} | {:>10} | ${:.4}",
            day.date.format("%Y-%m-%d"),
            stats.turns,
            format_count(stats.input_tokens),
            format_count(stats.output_tokens),
            format_count(stats.total_tokens()),
            day.usage.cost_usd
        ));
    }
    lines.join("\n")
}

fn render_totals(db: Database<'_>, pricing: &Pricing) -> String {
    let total = get_total_stats(db, pricing);
    let mut lines = vec![
        "=== Total Stats ===".to_string(),
        String::new(),
        format!("Sessions: {}", total.sessions),
    ];
    lines.extend(usage_lines(&total.usage));

    let recent = get_recent_sessions_with_stats(db, RECENT_SESSIONS, pricing);
    if !recent.is_empty() {
        lines.push(String::new());
        lines.push("--- Recent Sessions ---".to_string());
        lines.push(String::new());
        for s in &recent {
            lines.push(format!(
                "  {}  {:<10}  {:>4} turns  {:>10} tokens  {}  {}",
                short_id(&s.session.id),
                s.session.status.to_string(),
                s.session.total_turns,
                format_count(s.usage.stats.total_tokens()),
                project_name(&s.session.project_path),
                format_local_time(s.session.started_at)
            ));
        }
    }
    lines.join("\n")
}

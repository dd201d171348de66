//! Read-only usage reports and cost estimates.

use crate::config::ModelPricing;
use crate::core::state::Session;
use crate::storage::{Database, SessionTokens, TokenFilter, TokenStats};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::ValueEnum;
use std::collections::HashMap;

/// Built-in prices, matched by substring of the model name.
const BUILTIN_PRICING: [(&str, ModelPricing); 3] = [
    (
        "opus",
        ModelPricing {
            input: 15.0,
            output: 75.0,
        },
    ),
    (
        "sonnet",
        ModelPricing {
            input: 3.0,
            output: 15.0,
        },
    ),
    (
        "haiku",
        ModelPricing {
            input: 0.25,
            output: 1.25,
        },
    ),
];

/// Price used when no model matches.
pub const DEFAULT_PRICING: ModelPricing = ModelPricing {
    input: 3.0,
    output: 15.0,
};

const TOKENS_PER_UNIT: f64 = 1_000_000.0;

/// Pricing table: configured overrides first, then the built-in prices.
#[derive(Debug, Clone, Default)]
pub struct Pricing {
    overrides: Vec<(String, ModelPricing)>,
}

impl Pricing {
    /// Build a table from `[pricing.<fragment>]` overrides.
    ///
    /// Longer fragments win over shorter ones. A `default` entry replaces the
    /// fallback price.
    #[must_use]
    #[allow(clippy::implicit_hasher)]
    pub fn new(overrides: &HashMap<String, ModelPricing>) -> Self {
        let mut overrides: Vec<(String, ModelPricing)> = overrides
            .iter()
            .map(|(k, v)| (k.to_lowercase(), *v))
            .collect();
        overrides.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { overrides }
    }

    /// Price for a model.
    #[must_use]
    pub fn for_model(&self, model: Option<&str>) -> ModelPricing {
        let model = model.unwrap_or("").to_lowercase();
        let matches = |fragment: &str| fragment != "default" && model.contains(fragment);

        self.overrides
            .iter()
            .find(|(fragment, _)| matches(fragment))
            .map(|(_, p)| *p)
            .or_else(|| {
                BUILTIN_PRICING
                    .iter()
                    .find(|(fragment, _)| matches(fragment))
                    .map(|(_, p)| *p)
            })
            .or_else(|| {
                self.overrides
                    .iter()
                    .find(|(fragment, _)| fragment == "default")
                    .map(|(_, p)| *p)
            })
            .unwrap_or(DEFAULT_PRICING)
    }
}

/// Estimated cost in USD.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Cost {
    /// Cost of input tokens.
    pub input: f64,
    /// Cost of output tokens.
    pub output: f64,
    /// Sum of both.
    pub total: f64,
}

/// Estimate the cost of a token count.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn calculate_cost(
    input_tokens: u64,
    output_tokens: u64,
    model: Option<&str>,
    pricing: &Pricing,
) -> Cost {
    let price = pricing.for_model(model);
    let input = input_tokens as f64 / TOKENS_PER_UNIT * price.input;
    let output = output_tokens as f64 / TOKENS_PER_UNIT * price.output;
    Cost {
        input,
        output,
        total: input + output,
    }
}

/// Reporting period for [`get_period_stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Period {
    /// Last 24 hours.
    Day,
    /// Last 7 days.
    Week,
    /// Last 30 days.
    Month,
    /// Everything recorded.
    All,
}

impl Period {
    /// Start of the period ending at `now`, `None` for all time.
    #[must_use]
    pub fn since(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Day => Some(now - Duration::days(1)),
            Self::Week => Some(now - Duration::days(7)),
            Self::Month => Some(now - Duration::days(30)),
            Self::All => None,
        }
    }

    /// Lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::All => "all",
        }
    }
}

/// Token usage with its estimated cost.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Usage {
    /// Token counts.
    pub stats: TokenStats,
    /// Estimated cost in USD.
    pub cost_usd: f64,
}

impl Usage {
    /// Sum per-session usage, pricing each session by its own model.
    fn from_sessions(sessions: &[SessionTokens], pricing: &Pricing) -> Self {
        sessions.iter().fold(Self::default(), |mut usage, s| {
            usage.stats += s.stats;
            usage.cost_usd += calculate_cost(
                s.stats.input_tokens,
                s.stats.output_tokens,
                s.model.as_deref(),
                pricing,
            )
            .total;
            usage
        })
    }
}

/// One session with its usage.
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// The session record.
    pub session: Session,
    /// Last model used, if known.
    pub model: Option<String>,
    /// Usage over the session's lifetime.
    pub usage: Usage,
}

/// Usage over a period.
#[derive(Debug, Clone, Copy)]
pub struct PeriodStats {
    /// The period.
    pub period: Period,
    /// Usage within it.
    pub usage: Usage,
}

/// All-time usage.
#[derive(Debug, Clone, Copy)]
pub struct TotalStats {
    /// Number of stored sessions, with or without usage.
    pub sessions: usize,
    /// Usage.
    pub usage: Usage,
}

/// Usage of one calendar day.
#[derive(Debug, Clone, Copy)]
pub struct DailyStats {
    /// Date of the end of the 24h window.
    pub date: NaiveDate,
    /// Usage within the window.
    pub usage: Usage,
}

/// Usage of one session, found by exact id or unique prefix.
#[must_use]
pub fn get_session_stats(
    db: Database<'_>,
    id_or_prefix: &str,
    pricing: &Pricing,
) -> Option<SessionStats> {
    let session = db.find_session(id_or_prefix)?;
    Some(session_stats(db, session, pricing))
}

fn session_stats(db: Database<'_>, session: Session, pricing: &Pricing) -> SessionStats {
    let tokens = db.get_token_stats_by_session(&TokenFilter::session(&session.id));
    SessionStats {
        model: tokens.first().and_then(|t| t.model.clone()),
        usage: Usage::from_sessions(&tokens, pricing),
        session,
    }
}

/// Usage within a period ending at `now`.
#[must_use]
pub fn get_period_stats(
    db: Database<'_>,
    period: Period,
    now: DateTime<Utc>,
    pricing: &Pricing,
) -> PeriodStats {
    let filter = TokenFilter {
        session_id: None,
        from: period.since(now),
        to: Some(now),
    };
    PeriodStats {
        period,
        usage: Usage::from_sessions(&db.get_token_stats_by_session(&filter), pricing),
    }
}

/// All-time usage.
#[must_use]
pub fn get_total_stats(db: Database<'_>, pricing: &Pricing) -> TotalStats {
    TotalStats {
        sessions: db.get_session_count(),
        usage: Usage::from_sessions(
            &db.get_token_stats_by_session(&TokenFilter::default()),
            pricing,
        ),
    }
}

/// Usage per 24h window for the last `days` days, oldest first.
#[must_use]
pub fn get_daily_breakdown(
    db: Database<'_>,
    days: u32,
    now: DateTime<Utc>,
    pricing: &Pricing,
) -> Vec<DailyStats> {
    let mut breakdown: Vec<DailyStats> = (0..i64::from(days))
        .map(|i| {
            let end = now - Duration::days(i);
            let start = end - Duration::days(1);
            let tokens = db.get_token_stats_by_session(&TokenFilter::window(start, end));
            DailyStats {
                date: end.date_naive(),
                usage: Usage::from_sessions(&tokens, pricing),
            }
        })
        .collect();
    breakdown.reverse();
    breakdown
}

/// Most recently started sessions with their usage.
#[must_use]
pub fn get_recent_sessions_with_stats(
    db: Database<'_>,
    limit: usize,
    pricing: &Pricing,
) -> Vec<SessionStats> {
    db.get_recent_sessions(limit)
        .into_iter()
        .map(|session| session_stats(db, session, pricing))
        .collect()
}

//! Echolia Quota - atomic per-principal daily request ceilings.
//!
//! `tier_of` lives outside this crate (supplied by `echolia-auth`'s
//! `EntitlementResolver`); everything here operates once a tier is known.

use chrono::{DateTime, NaiveDate, Utc};
use echolia_types::Tier;
use sqlx::PgPool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("quota storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type QuotaResult<T> = Result<T, QuotaError>;

/// The two named ceilings this system recognizes. No middle tiers.
#[derive(Debug, Clone, Copy)]
pub struct QuotaConfig {
    pub free_daily_limit: u32,
    pub elevated_daily_limit: u32,
}

impl QuotaConfig {
    fn ceiling_for(&self, tier: Tier) -> u32 {
        match tier {
            Tier::Free => self.free_daily_limit,
            Tier::Elevated => self.elevated_daily_limit,
        }
    }
}

/// Read-only usage snapshot. Derived, never stored as such.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageSnapshot {
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    pub tier: Tier,
}

/// Outcome of a reservation attempt. The increment has already happened
/// by the time either variant is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum ReserveOutcome {
    Granted(UsageSnapshot),
    Exhausted(UsageSnapshot),
}

/// Enforces atomic daily ceilings via a single-statement Postgres upsert.
pub struct QuotaLedger {
    pool: PgPool,
    config: QuotaConfig,
}

impl QuotaLedger {
    pub fn new(pool: PgPool, config: QuotaConfig) -> Self {
        Self { pool, config }
    }

    /// Deterministic `YYYY-MM-DD` in UTC. The reset boundary is the UTC
    /// day rollover, not any client-local midnight.
    pub fn date_key(now_utc: DateTime<Utc>) -> String {
        now_utc.format("%Y-%m-%d").to_string()
    }

    fn next_utc_midnight(now_utc: DateTime<Utc>) -> DateTime<Utc> {
        let today = now_utc.date_naive();
        let tomorrow = today.succ_opt().unwrap_or(today);
        tomorrow_midnight(tomorrow)
    }

    /// Read-only: does not mutate the ledger.
    pub async fn peek(&self, principal_id: &str, tier: Tier) -> QuotaResult<UsageSnapshot> {
        let now = Utc::now();
        let date_key = Self::date_key(now);
        let ceiling = self.config.ceiling_for(tier);

        let count: Option<i64> = sqlx::query_scalar(
            "SELECT request_count FROM quota_ledger WHERE principal_id = $1 AND date_key = $2",
        )
        .bind(principal_id)
        .bind(&date_key)
        .fetch_optional(&self.pool)
        .await?;

        let used = count.unwrap_or(0).max(0) as u32;
        Ok(UsageSnapshot {
            remaining: ceiling.saturating_sub(used),
            reset_at: Self::next_utc_midnight(now),
            tier,
        })
    }

    /// Atomically increments today's counter, then compares to the
    /// tier ceiling. The increment is never rolled back, even when the
    /// outcome is `Exhausted` -- see module docs.
    pub async fn reserve(&self, principal_id: &str, tier: Tier) -> QuotaResult<ReserveOutcome> {
        let now = Utc::now();
        let date_key = Self::date_key(now);
        let ceiling = self.config.ceiling_for(tier);

        let new_count: i64 = sqlx::query_scalar(
            "INSERT INTO quota_ledger (principal_id, date_key, request_count, updated_at) \
             VALUES ($1, $2, 1, now()) \
             ON CONFLICT (principal_id, date_key) \
             DO UPDATE SET request_count = quota_ledger.request_count + 1, updated_at = now() \
             RETURNING request_count",
        )
        .bind(principal_id)
        .bind(&date_key)
        .fetch_one(&self.pool)
        .await?;

        let reset_at = Self::next_utc_midnight(now);
        let used = new_count.max(0) as u32;

        if used > ceiling {
            tracing::info!(principal_id, date_key, used, ceiling, "quota exhausted");
            Ok(ReserveOutcome::Exhausted(UsageSnapshot {
                remaining: 0,
                reset_at,
                tier,
            }))
        } else {
            Ok(ReserveOutcome::Granted(UsageSnapshot {
                remaining: ceiling - used,
                reset_at,
                tier,
            }))
        }
    }
}

fn tomorrow_midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
        .and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> QuotaConfig {
        QuotaConfig {
            free_daily_limit: 10,
            elevated_daily_limit: 100,
        }
    }

    #[test]
    fn date_key_formats_as_utc_calendar_date() {
        let now = DateTime::parse_from_rfc3339("2026-07-27T23:59:59Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(QuotaLedger::date_key(now), "2026-07-27");
    }

    #[test]
    fn next_utc_midnight_rolls_over_to_the_following_day() {
        let now = DateTime::parse_from_rfc3339("2026-07-27T23:59:59Z")
            .unwrap()
            .with_timezone(&Utc);
        let reset = QuotaLedger::next_utc_midnight(now);
        assert_eq!(reset.date_naive(), NaiveDate::from_ymd_opt(2026, 7, 28).unwrap());
        assert_eq!(reset.format("%H:%M:%S").to_string(), "00:00:00");
    }

    #[test]
    fn ceiling_selects_tier_specific_limit() {
        let config = test_config();
        assert_eq!(config.ceiling_for(Tier::Free), 10);
        assert_eq!(config.ceiling_for(Tier::Elevated), 100);
    }
}

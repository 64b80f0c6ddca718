//! The quota guard for the remote tier.
//!
//! Every tier-3 attempt asks for authorization first and records its
//! consumption afterwards, success or not. Counters live in time buckets
//! (rolling hour, UTC day, UTC month) that roll over on access, plus
//! cumulative per-model totals for reporting.

use crate::pricing::{ModelPricing, PricingTable};
use chrono::{DateTime, Datelike, Timelike, Utc};
use ekimate_config::QuotaConfig;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;

/// Why a remote call was refused. Checked in a fixed order; the first
/// exceeded ceiling wins.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QuotaDenied {
    #[error("hourly request limit reached ({limit} requests this hour)")]
    HourlyRequests { limit: u32 },

    #[error("daily token limit reached ({used} of {limit} tokens today)")]
    DailyTokens { used: u64, limit: u64 },

    #[error("monthly budget reached (${used:.2} of ${limit:.2} this month)")]
    MonthlyBudget { used: f64, limit: f64 },
}

/// Cumulative usage for one model.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ModelUsage {
    pub requests: u64,
    pub failures: u64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost_usd: f64,
}

/// A point-in-time usage report.
#[derive(Debug, Clone, Serialize)]
pub struct UsageSnapshot {
    pub hour_requests: u32,
    pub hourly_limit: u32,
    pub day_tokens: u64,
    pub daily_limit: u64,
    pub month_cost_usd: f64,
    pub monthly_limit_usd: f64,
    pub total_requests: u64,
    pub total_cost_usd: f64,
    /// Per-model cumulative usage, sorted by model name.
    pub models: Vec<(String, ModelUsage)>,
}

#[derive(Debug, Default)]
struct Buckets {
    // (ordinal day, hour) identifies the hour bucket across midnight.
    current_hour: (u32, u32),
    hour_requests: u32,
    current_day: u32,
    day_tokens: u64,
    current_month: u32,
    month_cost: f64,
    total_requests: u64,
    total_cost: f64,
    per_model: HashMap<String, ModelUsage>,
}

impl Buckets {
    fn roll_over(&mut self, now: DateTime<Utc>) {
        let hour = (now.ordinal(), now.hour());
        if hour != self.current_hour {
            self.current_hour = hour;
            self.hour_requests = 0;
        }
        if now.ordinal() != self.current_day {
            self.current_day = now.ordinal();
            self.day_tokens = 0;
        }
        if now.month() != self.current_month {
            self.current_month = now.month();
            self.month_cost = 0.0;
        }
    }
}

/// The guard itself. One per process, shared behind `Arc`.
pub struct UsageGuard {
    pricing: PricingTable,
    limits: QuotaConfig,
    buckets: RwLock<Buckets>,
}

impl UsageGuard {
    pub fn new(limits: QuotaConfig) -> Self {
        let pricing = PricingTable::with_defaults();
        for (model, p) in &limits.custom_pricing {
            pricing.set(model.clone(), ModelPricing::new(p.input_per_m, p.output_per_m));
        }

        let now = Utc::now();
        Self {
            pricing,
            limits,
            buckets: RwLock::new(Buckets {
                current_hour: (now.ordinal(), now.hour()),
                current_day: now.ordinal(),
                current_month: now.month(),
                ..Default::default()
            }),
        }
    }

    /// May a remote call to `model` proceed right now?
    pub fn authorize(&self, model: &str) -> Result<(), QuotaDenied> {
        self.authorize_at(model, Utc::now())
    }

    /// Record a remote attempt. Unconditional: failed and cancelled calls
    /// still consumed capacity upstream.
    pub fn record(&self, model: &str, tokens_in: u32, tokens_out: u32, succeeded: bool) {
        self.record_at(model, tokens_in, tokens_out, succeeded, Utc::now());
    }

    // `_model` is unused for now: every ceiling is global. It stays in the
    // signature so per-model quotas slot in without touching call sites.
    pub fn authorize_at(&self, _model: &str, now: DateTime<Utc>) -> Result<(), QuotaDenied> {
        let mut buckets = self.buckets.write().unwrap_or_else(|e| e.into_inner());
        buckets.roll_over(now);

        if buckets.hour_requests >= self.limits.hourly_requests {
            return Err(QuotaDenied::HourlyRequests {
                limit: self.limits.hourly_requests,
            });
        }
        if buckets.day_tokens >= self.limits.daily_tokens {
            return Err(QuotaDenied::DailyTokens {
                used: buckets.day_tokens,
                limit: self.limits.daily_tokens,
            });
        }
        if buckets.month_cost >= self.limits.monthly_usd {
            return Err(QuotaDenied::MonthlyBudget {
                used: buckets.month_cost,
                limit: self.limits.monthly_usd,
            });
        }

        Ok(())
    }

    pub fn record_at(
        &self,
        model: &str,
        tokens_in: u32,
        tokens_out: u32,
        succeeded: bool,
        now: DateTime<Utc>,
    ) {
        let cost = self.pricing.compute_cost(model, tokens_in, tokens_out);

        let mut buckets = self.buckets.write().unwrap_or_else(|e| e.into_inner());
        buckets.roll_over(now);

        buckets.hour_requests += 1;
        buckets.day_tokens += (tokens_in + tokens_out) as u64;
        buckets.month_cost += cost;
        buckets.total_requests += 1;
        buckets.total_cost += cost;

        let usage = buckets.per_model.entry(model.to_string()).or_default();
        usage.requests += 1;
        if !succeeded {
            usage.failures += 1;
        }
        usage.tokens_in += tokens_in as u64;
        usage.tokens_out += tokens_out as u64;
        usage.cost_usd += cost;

        tracing::debug!(
            model = %model,
            tokens_in,
            tokens_out,
            cost_usd = cost,
            succeeded,
            "recorded remote usage"
        );
    }

    /// Current usage, buckets rolled over first.
    pub fn snapshot(&self) -> UsageSnapshot {
        let mut buckets = self.buckets.write().unwrap_or_else(|e| e.into_inner());
        buckets.roll_over(Utc::now());

        let mut models: Vec<(String, ModelUsage)> = buckets
            .per_model
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        models.sort_by(|a, b| a.0.cmp(&b.0));

        UsageSnapshot {
            hour_requests: buckets.hour_requests,
            hourly_limit: self.limits.hourly_requests,
            day_tokens: buckets.day_tokens,
            daily_limit: self.limits.daily_tokens,
            month_cost_usd: buckets.month_cost,
            monthly_limit_usd: self.limits.monthly_usd,
            total_requests: buckets.total_requests,
            total_cost_usd: buckets.total_cost,
            models,
        }
    }
}

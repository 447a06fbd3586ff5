//! Rate resolution for booking cost previews.
//!
//! A rate table holds charge/pay rates per driver class and category (days,
//! nights, saturday, sunday). Two lookups are built on the same category
//! selection:
//! - [`resolve_preview`]: per-day breakdown over a date range, with an explicit
//!   [`FallbackPolicy`] for missing weekend rates
//! - [`resolve_booking_rate`]: one customer-scoped category, never substituted
//!
//! Both return `None` instead of a partial or zero-filled result when the
//! inputs are incomplete or a needed rate is missing.

use anyhow::Context;
use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

pub const FALLBACK_RATE_NAME: &str = "Days Rate (fallback)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RateCategory {
    Days,
    Nights,
    Saturday,
    Sunday,
}

impl RateCategory {
    pub fn rate_name(&self) -> &'static str {
        match self {
            RateCategory::Days => "Days Rate",
            RateCategory::Nights => "Nights Rate",
            RateCategory::Saturday => "Saturday Rate",
            RateCategory::Sunday => "Sunday Rate",
        }
    }

    /// Category a shift is billed under.
    pub fn select(is_night_shift: bool, day_type: DayType) -> Self {
        if is_night_shift {
            return RateCategory::Nights;
        }
        match day_type {
            DayType::Saturday => RateCategory::Saturday,
            DayType::Sunday => RateCategory::Sunday,
            DayType::Weekday => RateCategory::Days,
        }
    }
}

impl fmt::Display for RateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RateCategory::Days => "days",
            RateCategory::Nights => "nights",
            RateCategory::Saturday => "saturday",
            RateCategory::Sunday => "sunday",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DayType {
    Weekday,
    Saturday,
    Sunday,
}

impl DayType {
    pub fn of(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Sat => DayType::Saturday,
            Weekday::Sun => DayType::Sunday,
            _ => DayType::Weekday,
        }
    }
}

impl FromStr for DayType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weekday" | "days" => Ok(DayType::Weekday),
            "saturday" => Ok(DayType::Saturday),
            "sunday" => Ok(DayType::Sunday),
            _ => Err(format!("Unknown day type: {}. Valid options: weekday, saturday, sunday", s)),
        }
    }
}

/// What to do when a Saturday or Sunday rate is not configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Bill the weekend day at the weekday rate, labelled as a fallback.
    #[default]
    WeekdayFallback,
    /// No preview.
    Strict,
}

/// One row of a rate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub driver_class: String,
    pub rate_category: RateCategory,
    pub charge_rate: Decimal,
    pub pay_rate: Decimal,
    #[serde(default)]
    pub valid_from: Option<NaiveDate>,
    #[serde(default)]
    pub valid_to: Option<NaiveDate>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl CompanyRate {
    /// Active and inside the validity window (open ends allowed).
    pub fn applies_on(&self, date: NaiveDate) -> bool {
        self.is_active
            && self.valid_from.is_none_or(|from| from <= date)
            && self.valid_to.is_none_or(|to| date <= to)
    }

    pub fn margin(&self) -> Decimal {
        self.charge_rate - self.pay_rate
    }
}

/// Load a rate table from a JSON or YAML list.
pub fn load_rate_table(path: &Path) -> anyhow::Result<Vec<CompanyRate>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("failed to read rate table {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let rates = if is_json {
        serde_json::from_str(&content).with_context(|| format!("invalid rate table {}", path.display()))?
    } else {
        serde_yaml_ng::from_str(&content).with_context(|| format!("invalid rate table {}", path.display()))?
    };
    Ok(rates)
}

#[derive(Debug, Clone, Default)]
pub struct PreviewRequest {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub driver_class: Option<String>,
    pub is_night_shift: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct DayRate {
    #[schemars(with = "String")]
    pub date: NaiveDate,
    pub day_name: String,
    pub rate_name: String,
    #[schemars(with = "String")]
    pub charge_rate: Decimal,
    #[schemars(with = "String")]
    pub pay_rate: Decimal,
    #[schemars(with = "String")]
    pub margin: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct RatePreview {
    pub driver_class: String,
    pub is_night_shift: bool,
    pub days: Vec<DayRate>,
    #[schemars(with = "String")]
    pub total_charge_rate: Decimal,
    #[schemars(with = "String")]
    pub total_pay_rate: Decimal,
    #[schemars(with = "String")]
    pub total_margin: Decimal,
    pub total_days: usize,
}

/// Per-day breakdown for every date in `start_date..=end_date`.
pub fn resolve_preview(request: &PreviewRequest, rates: &[CompanyRate], policy: FallbackPolicy) -> Option<RatePreview> {
    let start = request.start_date?;
    let end = request.end_date?;
    let driver_class = request
        .driver_class
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())?;
    if end < start {
        return None;
    }

    // Customer-specific rows belong to the booking lookup only
    let class_rates: Vec<&CompanyRate> = rates
        .iter()
        .filter(|r| r.customer_id.is_none() && r.driver_class == driver_class)
        .collect();
    if class_rates.is_empty() {
        debug!(driver_class, "no rates configured for driver class");
        return None;
    }

    let mut days = Vec::new();
    for date in start.iter_days().take_while(|d| *d <= end) {
        match resolve_day(date, &class_rates, request.is_night_shift, policy) {
            Some(day) => days.push(day),
            None => {
                debug!(driver_class, %date, "no applicable rate for day");
                return None;
            }
        }
    }

    let total_charge_rate = days.iter().map(|d| d.charge_rate).sum();
    let total_pay_rate = days.iter().map(|d| d.pay_rate).sum();
    let total_margin = days.iter().map(|d| d.margin).sum();
    Some(RatePreview {
        driver_class: driver_class.to_string(),
        is_night_shift: request.is_night_shift,
        total_days: days.len(),
        days,
        total_charge_rate,
        total_pay_rate,
        total_margin,
    })
}

fn resolve_day(date: NaiveDate, rates: &[&CompanyRate], is_night_shift: bool, policy: FallbackPolicy) -> Option<DayRate> {
    let wanted = RateCategory::select(is_night_shift, DayType::of(date));
    let (rate, rate_name) = match find_rate(rates.iter().copied(), wanted, date) {
        Some(rate) => (rate, wanted.rate_name()),
        None if policy == FallbackPolicy::WeekdayFallback
            && matches!(wanted, RateCategory::Saturday | RateCategory::Sunday) =>
        {
            (find_rate(rates.iter().copied(), RateCategory::Days, date)?, FALLBACK_RATE_NAME)
        }
        None => return None,
    };

    Some(DayRate {
        date,
        day_name: date.format("%A").to_string(),
        rate_name: rate_name.to_string(),
        charge_rate: rate.charge_rate,
        pay_rate: rate.pay_rate,
        margin: rate.margin(),
    })
}

/// Most recently started rate of `category` that applies on `date`.
fn find_rate<'r>(
    rates: impl Iterator<Item = &'r CompanyRate>,
    category: RateCategory,
    date: NaiveDate,
) -> Option<&'r CompanyRate> {
    rates
        .filter(|r| r.rate_category == category && r.applies_on(date))
        .max_by_key(|r| r.valid_from)
}

#[derive(Debug, Clone)]
pub struct BookingRateRequest {
    pub customer_id: String,
    pub driver_class: String,
    pub is_night_shift: bool,
    pub day_type: DayType,
    /// Booking date for validity filtering; without it only `is_active` counts.
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct BookingRate {
    pub rate_category: RateCategory,
    pub rate_name: String,
    #[schemars(with = "String")]
    pub charge_rate: Decimal,
    #[schemars(with = "String")]
    pub pay_rate: Decimal,
    #[schemars(with = "String")]
    pub margin: Decimal,
}

/// Single category lookup scoped to one customer. There is no weekday
/// substitution: a missing category yields `None`.
pub fn resolve_booking_rate(request: &BookingRateRequest, rates: &[CompanyRate]) -> Option<BookingRate> {
    if request.customer_id.trim().is_empty() || request.driver_class.trim().is_empty() {
        return None;
    }
    let category = RateCategory::select(request.is_night_shift, request.day_type);

    let rate = rates
        .iter()
        .filter(|r| {
            r.customer_id.as_deref() == Some(request.customer_id.as_str())
                && r.driver_class == request.driver_class
                && r.rate_category == category
        })
        .filter(|r| match request.date {
            Some(date) => r.applies_on(date),
            None => r.is_active,
        })
        .max_by_key(|r| r.valid_from)?;

    Some(BookingRate {
        rate_category: category,
        rate_name: category.rate_name().to_string(),
        charge_rate: rate.charge_rate,
        pay_rate: rate.pay_rate,
        margin: rate.margin(),
    })
}

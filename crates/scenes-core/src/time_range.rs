//! Time range provider
//!
//! Raw `from`/`to` expressions (`now`, `now-6h`, `now-1d/d`, RFC 3339
//! timestamps, epoch milliseconds) are evaluated into absolute UTC instants.

use crate::error::{SceneError, SceneResult};
use crate::graph;
use crate::object::{attach, SceneNode, SceneObject, SceneObjectBase, SceneState};
use crate::scene_object_casts;
use crate::url_sync::{SceneObjectUrlValues, UrlSyncHandler, UrlValue};
use chrono::{DateTime, Datelike, Duration, Months, TimeDelta, TimeZone, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Zone reported when neither the range nor any ancestor declares one
pub const DEFAULT_TIME_ZONE: &str = "browser";

/// Default relative range
pub const DEFAULT_FROM: &str = "now-6h";

/// Default end of range
pub const DEFAULT_TO: &str = "now";

/// Unevaluated range expressions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTimeRange {
    /// Start expression
    pub from: String,
    /// End expression
    pub to: String,
}

impl RawTimeRange {
    /// Create from two expressions
    #[inline]
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl Default for RawTimeRange {
    fn default() -> Self {
        Self::new(DEFAULT_FROM, DEFAULT_TO)
    }
}

/// Evaluated range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Absolute start
    pub from: DateTime<Utc>,
    /// Absolute end
    pub to: DateTime<Utc>,
    /// Expressions the range was evaluated from
    pub raw: RawTimeRange,
}

static RELATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^now(?:([+-])(\d+)([smhdwMy]))?(?:/([smhdwMy]))?$")
        .expect("valid relative time pattern")
});

/// Evaluate a single expression relative to `now`
///
/// `round_up` selects the end of the rounding unit for `/unit` suffixes.
pub fn parse_time_expression(
    expr: &str,
    now: DateTime<Utc>,
    round_up: bool,
) -> SceneResult<DateTime<Utc>> {
    let expr = expr.trim();
    let invalid = || SceneError::InvalidTimeExpression {
        expr: expr.to_string(),
    };

    if let Some(caps) = RELATIVE.captures(expr) {
        let mut instant = now;
        if let (Some(sign), Some(amount), Some(unit)) = (caps.get(1), caps.get(2), caps.get(3)) {
            let amount: i64 = amount.as_str().parse().map_err(|_| invalid())?;
            let amount = if sign.as_str() == "-" { -amount } else { amount };
            instant = shift(instant, amount, unit.as_str()).ok_or_else(invalid)?;
        }
        if let Some(unit) = caps.get(4) {
            instant = round(instant, unit.as_str(), round_up).ok_or_else(invalid)?;
        }
        return Ok(instant);
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(expr) {
        return Ok(parsed.with_timezone(&Utc));
    }

    if !expr.is_empty() && expr.chars().all(|c| c.is_ascii_digit()) {
        let millis: i64 = expr.parse().map_err(|_| invalid())?;
        return Utc.timestamp_millis_opt(millis).single().ok_or_else(invalid);
    }

    Err(invalid())
}

fn shift(instant: DateTime<Utc>, amount: i64, unit: &str) -> Option<DateTime<Utc>> {
    let months = |n: i64| -> Option<DateTime<Utc>> {
        let m = Months::new(u32::try_from(n.unsigned_abs()).ok()?);
        if n < 0 {
            instant.checked_sub_months(m)
        } else {
            instant.checked_add_months(m)
        }
    };
    let delta = match unit {
        "s" => TimeDelta::try_seconds(amount)?,
        "m" => TimeDelta::try_minutes(amount)?,
        "h" => TimeDelta::try_hours(amount)?,
        "d" => TimeDelta::try_days(amount)?,
        "w" => TimeDelta::try_weeks(amount)?,
        "M" => return months(amount),
        "y" => return months(amount.checked_mul(12)?),
        _ => return None,
    };
    instant.checked_add_signed(delta)
}

fn round(instant: DateTime<Utc>, unit: &str, round_up: bool) -> Option<DateTime<Utc>> {
    let start = match unit {
        "s" => instant.with_nanosecond(0)?,
        "m" => instant.with_nanosecond(0)?.with_second(0)?,
        "h" => instant.with_nanosecond(0)?.with_second(0)?.with_minute(0)?,
        "d" => Utc.from_utc_datetime(&instant.date_naive().and_hms_opt(0, 0, 0)?),
        "w" => {
            let day = Utc.from_utc_datetime(&instant.date_naive().and_hms_opt(0, 0, 0)?);
            day - Duration::days(i64::from(instant.weekday().num_days_from_monday()))
        }
        "M" => Utc.with_ymd_and_hms(instant.year(), instant.month(), 1, 0, 0, 0).single()?,
        "y" => Utc.with_ymd_and_hms(instant.year(), 1, 1, 0, 0, 0).single()?,
        _ => return None,
    };
    if !round_up {
        return Some(start);
    }
    shift(start, 1, unit)?.checked_sub_signed(Duration::milliseconds(1))
}

/// Evaluate both ends of a range relative to `now`
pub fn evaluate_time_range(raw: &RawTimeRange, now: DateTime<Utc>) -> SceneResult<TimeRange> {
    Ok(TimeRange {
        from: parse_time_expression(&raw.from, now, false)?,
        to: parse_time_expression(&raw.to, now, true)?,
        raw: raw.clone(),
    })
}

/// Time range capability
pub trait SceneTimeRangeLike: SceneObject {
    /// Unevaluated expressions
    fn raw(&self) -> RawTimeRange;

    /// Last evaluated range
    fn time_range(&self) -> TimeRange;

    /// Effective time zone
    fn time_zone(&self) -> String;

    /// Replace the range expressions
    fn on_time_range_change(&self, raw: RawTimeRange);

    /// Replace the declared time zone
    fn on_time_zone_change(&self, time_zone: &str);

    /// Re-evaluate relative expressions against the current clock
    fn on_refresh(&self);
}

/// State of a [`SceneTimeRange`]
#[derive(Debug, Clone)]
pub struct SceneTimeRangeState {
    /// Start expression
    pub from: String,
    /// End expression
    pub to: String,
    /// Declared zone, inherited from ancestors when absent
    pub time_zone: Option<String>,
    /// Evaluated range
    pub value: TimeRange,
}

impl SceneState for SceneTimeRangeState {}

/// Standard time range provider
pub struct SceneTimeRange {
    base: SceneObjectBase<SceneTimeRangeState>,
}

impl SceneTimeRange {
    /// Range from two expressions; invalid expressions fall back to the defaults
    #[must_use]
    pub fn new(from: &str, to: &str) -> Arc<Self> {
        Self::build(from, to, None)
    }

    /// Range with a declared time zone
    #[must_use]
    pub fn with_time_zone(from: &str, to: &str, time_zone: &str) -> Arc<Self> {
        Self::build(from, to, Some(time_zone.to_string()))
    }

    fn build(from: &str, to: &str, time_zone: Option<String>) -> Arc<Self> {
        let raw = RawTimeRange::new(from, to);
        let value = evaluate_or_default(&raw);
        attach(Self {
            base: SceneObjectBase::new(SceneTimeRangeState {
                from: raw.from,
                to: raw.to,
                time_zone,
                value,
            }),
        })
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> Arc<SceneTimeRangeState> {
        self.base.state()
    }

    /// Object base
    #[inline]
    #[must_use]
    pub fn base(&self) -> &SceneObjectBase<SceneTimeRangeState> {
        &self.base
    }
}

impl Default for SceneTimeRangeState {
    fn default() -> Self {
        let raw = RawTimeRange::default();
        Self {
            value: evaluate_or_default(&raw),
            from: raw.from,
            to: raw.to,
            time_zone: None,
        }
    }
}

fn evaluate_or_default(raw: &RawTimeRange) -> TimeRange {
    let now = Utc::now();
    evaluate_time_range(raw, now).unwrap_or_else(|err| {
        warn!(error = %err, "invalid time range; using default");
        let fallback = RawTimeRange::default();
        TimeRange {
            from: now - Duration::hours(6),
            to: now,
            raw: fallback,
        }
    })
}

impl SceneObject for SceneTimeRange {
    fn node(&self) -> &SceneNode {
        self.base.node()
    }

    fn kind(&self) -> &'static str {
        "SceneTimeRange"
    }

    scene_object_casts!();

    fn as_url_sync(&self) -> Option<&dyn UrlSyncHandler> {
        Some(self)
    }
}

impl SceneTimeRangeLike for SceneTimeRange {
    fn raw(&self) -> RawTimeRange {
        let state = self.base.state();
        RawTimeRange::new(state.from.clone(), state.to.clone())
    }

    fn time_range(&self) -> TimeRange {
        self.base.state().value.clone()
    }

    fn time_zone(&self) -> String {
        if let Some(zone) = &self.base.state().time_zone {
            return zone.clone();
        }
        // The owner holds this range in its slot; look past it.
        self.node()
            .parent()
            .and_then(|owner| owner.node().parent())
            .map_or_else(
                || DEFAULT_TIME_ZONE.to_string(),
                |above| graph::get_time_range(&*above).time_zone(),
            )
    }

    fn on_time_range_change(&self, raw: RawTimeRange) {
        let value = match evaluate_time_range(&raw, Utc::now()) {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "ignoring time range change");
                return;
            }
        };
        self.base.set_state(|s| {
            s.from = raw.from;
            s.to = raw.to;
            s.value = value;
        });
    }

    fn on_time_zone_change(&self, time_zone: &str) {
        let zone = time_zone.to_string();
        self.base.set_state(|s| s.time_zone = Some(zone));
    }

    fn on_refresh(&self) {
        let raw = self.raw();
        let value = evaluate_or_default(&raw);
        self.base.set_state(|s| s.value = value);
    }
}

impl UrlSyncHandler for SceneTimeRange {
    fn url_keys(&self) -> Vec<String> {
        vec!["from".to_string(), "to".to_string()]
    }

    fn get_url_state(&self) -> SceneObjectUrlValues {
        let raw = self.raw();
        let mut values = SceneObjectUrlValues::new();
        values.insert("from".to_string(), UrlValue::Single(raw.from));
        values.insert("to".to_string(), UrlValue::Single(raw.to));
        values
    }

    fn update_from_url(&self, values: &SceneObjectUrlValues) {
        let current = self.raw();
        let pick = |key: &str| values.get(key).and_then(UrlValue::first).map(str::to_string);
        let raw = RawTimeRange::new(
            pick("from").unwrap_or(current.from),
            pick("to").unwrap_or(current.to),
        );
        if raw != self.raw() {
            self.on_time_range_change(raw);
        }
    }
}

//! Daily volume forecast of newly opened operations.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;

use crate::display::round_to;
use crate::error::{OpsError, Result};
use crate::models::OperationRecord;

pub const MIN_HORIZON_DAYS: u32 = 30;
pub const MAX_HORIZON_DAYS: u32 = 365;

/// Two-sided 95% normal interval.
const INTERVAL_Z: f64 = 1.96;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub operations: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub expected: f64,
    pub lower: f64,
    pub upper: f64,
}

pub trait Forecaster: Send + Sync {
    fn name(&self) -> &'static str;

    /// Predicts one point per day after the last history date.
    fn forecast(&self, history: &[DailyCount], horizon_days: u32) -> Result<Vec<ForecastPoint>>;
}

/// Openings per calendar day from the first to the last opening date, with
/// quiet days counted as zero.
pub fn daily_counts(ops: &[OperationRecord]) -> Vec<DailyCount> {
    let mut per_day: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for date in ops.iter().filter_map(|op| op.opened_on) {
        *per_day.entry(date).or_insert(0) += 1;
    }
    let (Some(&first), Some(&last)) = (per_day.keys().next(), per_day.keys().next_back()) else {
        return Vec::new();
    };
    first
        .iter_days()
        .take_while(|d| *d <= last)
        .map(|date| DailyCount {
            date,
            operations: per_day.get(&date).copied().unwrap_or(0),
        })
        .collect()
}

/// Linear trend plus a weekly profile, with a normal interval from the
/// residual spread.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeasonalTrendForecaster;

impl Forecaster for SeasonalTrendForecaster {
    fn name(&self) -> &'static str {
        "seasonal-trend"
    }

    fn forecast(&self, history: &[DailyCount], horizon_days: u32) -> Result<Vec<ForecastPoint>> {
        if history.len() < 2 {
            return Err(OpsError::InsufficientHistory(format!(
                "{} day(s) of openings, at least 2 needed",
                history.len()
            )));
        }
        let origin = history[0].date;
        let xs: Vec<f64> = history.iter().map(|h| (h.date - origin).num_days() as f64).collect();
        let ys: Vec<f64> = history.iter().map(|h| h.operations as f64).collect();

        let n = xs.len() as f64;
        let mean_x = xs.iter().sum::<f64>() / n;
        let mean_y = ys.iter().sum::<f64>() / n;
        let sxx: f64 = xs.iter().map(|x| (x - mean_x).powi(2)).sum();
        let sxy: f64 = xs.iter().zip(&ys).map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();
        let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
        let intercept = mean_y - slope * mean_x;
        let trend = |x: f64| intercept + slope * x;

        let mut weekday_sums = [(0.0f64, 0u32); 7];
        for (h, (x, y)) in history.iter().zip(xs.iter().zip(&ys)) {
            let slot = &mut weekday_sums[h.date.weekday().num_days_from_monday() as usize];
            slot.0 += y - trend(*x);
            slot.1 += 1;
        }
        let weekday_offset: Vec<f64> = weekday_sums
            .iter()
            .map(|(sum, n)| if *n > 0 { sum / *n as f64 } else { 0.0 })
            .collect();
        let offset = |d: NaiveDate| weekday_offset[d.weekday().num_days_from_monday() as usize];

        let sq_err: f64 = history
            .iter()
            .zip(xs.iter().zip(&ys))
            .map(|(h, (x, y))| (y - trend(*x) - offset(h.date)).powi(2))
            .sum();
        let sigma = (sq_err / n).sqrt();

        let last = history[history.len() - 1].date;
        let points = (1..=horizon_days as i64)
            .map(|step| {
                let date = last + Duration::days(step);
                let x = (date - origin).num_days() as f64;
                let expected = (trend(x) + offset(date)).max(0.0);
                ForecastPoint {
                    date,
                    expected: round_to(expected, 2),
                    lower: round_to((expected - INTERVAL_Z * sigma).max(0.0), 2),
                    upper: round_to(expected + INTERVAL_Z * sigma, 2),
                }
            })
            .collect();
        Ok(points)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeForecast {
    pub model: &'static str,
    pub horizon_days: u32,
    pub history: Vec<DailyCount>,
    pub points: Vec<ForecastPoint>,
}

pub fn validate_horizon(horizon_days: u32) -> Result<u32> {
    if (MIN_HORIZON_DAYS..=MAX_HORIZON_DAYS).contains(&horizon_days) {
        Ok(horizon_days)
    } else {
        Err(OpsError::InvalidArgument(format!(
            "horizon must be between {} and {} days, got {}",
            MIN_HORIZON_DAYS, MAX_HORIZON_DAYS, horizon_days
        )))
    }
}

pub fn forecast_volume(
    ops: &[OperationRecord],
    horizon_days: u32,
    forecaster: &dyn Forecaster,
) -> Result<VolumeForecast> {
    let horizon_days = validate_horizon(horizon_days)?;
    let history = daily_counts(ops);
    let points = forecaster.forecast(&history, horizon_days)?;
    Ok(VolumeForecast {
        model: forecaster.name(),
        horizon_days,
        history,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opened(dates: &[(i32, u32, u32)]) -> Vec<OperationRecord> {
        dates
            .iter()
            .enumerate()
            .map(|(i, (y, m, d))| {
                let mut r = OperationRecord::empty(format!("F{}", i));
                r.opened_on = NaiveDate::from_ymd_opt(*y, *m, *d);
                r
            })
            .collect()
    }

    #[test]
    fn test_daily_counts_fill_gaps() {
        let counts = daily_counts(&opened(&[(2024, 1, 1), (2024, 1, 1), (2024, 1, 4)]));
        let values: Vec<u32> = counts.iter().map(|c| c.operations).collect();
        assert_eq!(values, vec![2, 0, 0, 1]);
        assert!(daily_counts(&[]).is_empty());
    }

    #[test]
    fn test_horizon_bounds() {
        assert!(validate_horizon(30).is_ok());
        assert!(validate_horizon(365).is_ok());
        assert!(matches!(validate_horizon(29), Err(OpsError::InvalidArgument(_))));
        assert!(matches!(validate_horizon(366), Err(OpsError::InvalidArgument(_))));
    }

    #[test]
    fn test_single_day_is_insufficient() {
        let err = forecast_volume(&opened(&[(2024, 1, 1)]), 30, &SeasonalTrendForecaster).unwrap_err();
        assert!(matches!(err, OpsError::InsufficientHistory(_)));
    }

    #[test]
    fn test_flat_history_forecasts_flat() {
        let history: Vec<DailyCount> = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .iter_days()
            .take(28)
            .map(|date| DailyCount { date, operations: 3 })
            .collect();
        let points = SeasonalTrendForecaster.forecast(&history, 30).unwrap();
        assert_eq!(points.len(), 30);
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2024, 1, 29).unwrap());
        assert!(points.iter().all(|p| (p.expected - 3.0).abs() < 1e-6));
        assert!(points.iter().all(|p| p.lower <= p.expected && p.expected <= p.upper));
    }

    #[test]
    fn test_weekly_pattern_is_kept() {
        // busy Mondays, quiet otherwise
        let history: Vec<DailyCount> = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .iter_days()
            .take(56)
            .map(|date| DailyCount {
                date,
                operations: if date.weekday() == chrono::Weekday::Mon { 10 } else { 1 },
            })
            .collect();
        let points = SeasonalTrendForecaster.forecast(&history, 30).unwrap();
        let monday = points.iter().find(|p| p.date.weekday() == chrono::Weekday::Mon).unwrap();
        let tuesday = points.iter().find(|p| p.date.weekday() == chrono::Weekday::Tue).unwrap();
        assert!(monday.expected > tuesday.expected + 5.0);
    }
}

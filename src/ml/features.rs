//! Feature building
//!
//! Joins footfall and weather on the hour, aggregates to one row per hour and
//! encodes the design matrix. [`FeatureColumn`] is the schema contract shared by
//! training and inference: each variant knows how to produce its value from a
//! training observation and from a prediction request.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use chrono::{Datelike, NaiveDateTime, Timelike};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::loader::{RawFootfallRecord, RawWeatherRecord, TimeSeries};

/// One hour of joined, aggregated data.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlyObservation {
    pub timestamp: NaiveDateTime,
    /// Sum over contributing footfall rows.
    pub in_count: Option<f64>,
    pub out_count: Option<f64>,
    /// Means over contributing rows.
    pub temperature: Option<f64>,
    pub precipitation: Option<f64>,
    pub cloud_cover: Option<f64>,
    pub hour_of_day: u32,
    /// 0 = Monday .. 6 = Sunday
    pub day_of_week: u32,
}

/// Externally supplied conditions for a single prediction.
///
/// No range validation: an hour or weekday outside the trained range only
/// switches every weekday indicator off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionInput {
    pub temperature: f64,
    pub precipitation: f64,
    pub cloud_cover: f64,
    pub hour: i64,
    pub day_of_week: i64,
}

/// A named column of the design matrix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FeatureColumn {
    Temperature,
    Precipitation,
    CloudCover,
    HourOfDay,
    /// Indicator for weekday `k` (1 = Tuesday .. 6 = Sunday).
    DayOfWeek(u32),
    /// A name this build does not know how to derive; always contributes 0.0.
    Unrecognized(String),
}

impl FeatureColumn {
    /// Continuous columns, in schema order, ahead of the weekday indicators.
    pub const CONTINUOUS: [FeatureColumn; 4] = [
        FeatureColumn::Temperature,
        FeatureColumn::Precipitation,
        FeatureColumn::CloudCover,
        FeatureColumn::HourOfDay,
    ];

    /// Value of this column for a training observation, `None` if missing.
    pub fn observed_value(&self, obs: &HourlyObservation) -> Option<f64> {
        match self {
            FeatureColumn::Temperature => obs.temperature,
            FeatureColumn::Precipitation => obs.precipitation,
            FeatureColumn::CloudCover => obs.cloud_cover,
            FeatureColumn::HourOfDay => Some(obs.hour_of_day as f64),
            FeatureColumn::DayOfWeek(k) => Some(indicator(obs.day_of_week as i64 == *k as i64)),
            FeatureColumn::Unrecognized(_) => None,
        }
    }

    /// Value of this column for a prediction request. Never fails.
    pub fn input_value(&self, input: &PredictionInput) -> f64 {
        match self {
            FeatureColumn::Temperature => input.temperature,
            FeatureColumn::Precipitation => input.precipitation,
            FeatureColumn::CloudCover => input.cloud_cover,
            FeatureColumn::HourOfDay => input.hour as f64,
            FeatureColumn::DayOfWeek(k) => indicator(input.day_of_week == *k as i64),
            FeatureColumn::Unrecognized(_) => 0.0,
        }
    }
}

fn indicator(on: bool) -> f64 {
    if on { 1.0 } else { 0.0 }
}

impl fmt::Display for FeatureColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureColumn::Temperature => write!(f, "temperature"),
            FeatureColumn::Precipitation => write!(f, "precipitation"),
            FeatureColumn::CloudCover => write!(f, "cloud_cover"),
            FeatureColumn::HourOfDay => write!(f, "hour_of_day"),
            FeatureColumn::DayOfWeek(k) => write!(f, "dow_{}", k),
            FeatureColumn::Unrecognized(name) => write!(f, "{}", name),
        }
    }
}

impl From<String> for FeatureColumn {
    fn from(name: String) -> Self {
        match name.as_str() {
            "temperature" => FeatureColumn::Temperature,
            "precipitation" => FeatureColumn::Precipitation,
            "cloud_cover" => FeatureColumn::CloudCover,
            "hour_of_day" => FeatureColumn::HourOfDay,
            other => match other.strip_prefix("dow_").and_then(|k| k.parse::<u32>().ok()) {
                Some(k) if (1..=6).contains(&k) => FeatureColumn::DayOfWeek(k),
                _ => FeatureColumn::Unrecognized(name),
            },
        }
    }
}

impl From<FeatureColumn> for String {
    fn from(column: FeatureColumn) -> Self {
        column.to_string()
    }
}

/// Design matrix and target, rows in ascending timestamp order.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub columns: Vec<FeatureColumn>,
    /// One row per hour, without the intercept column.
    pub records: Array2<f64>,
    /// Aggregated in-count per row.
    pub targets: Array1<f64>,
    pub timestamps: Vec<NaiveDateTime>,
}

impl FeatureMatrix {
    pub fn n_rows(&self) -> usize {
        self.targets.len()
    }
}

/// Builds [`FeatureMatrix`] values from raw series.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    min_rows: usize,
}

impl FeatureBuilder {
    pub fn new(min_rows: usize) -> Self {
        Self { min_rows }
    }

    /// Join, aggregate, encode and filter.
    pub fn build(&self, series: &TimeSeries) -> Result<FeatureMatrix, ForecastError> {
        let observations = join_and_aggregate(&series.footfall, &series.weather)?;
        self.encode(&observations)
    }

    /// Encode aggregated observations, dropping any row with a missing value.
    pub fn encode(&self, observations: &[HourlyObservation]) -> Result<FeatureMatrix, ForecastError> {
        let columns = feature_columns(observations);

        let mut flat = Vec::with_capacity(observations.len() * columns.len());
        let mut targets = Vec::with_capacity(observations.len());
        let mut timestamps = Vec::with_capacity(observations.len());

        for obs in observations {
            let Some(target) = obs.in_count else {
                continue;
            };
            let row: Option<Vec<f64>> = columns.iter().map(|c| c.observed_value(obs)).collect();
            let Some(row) = row else {
                continue;
            };

            flat.extend(row);
            targets.push(target);
            timestamps.push(obs.timestamp);
        }

        let n_rows = targets.len();
        tracing::debug!(
            "Encoded {} of {} hourly rows into {} feature columns",
            n_rows,
            observations.len(),
            columns.len()
        );

        if n_rows < self.min_rows {
            return Err(ForecastError::InsufficientData {
                found: n_rows,
                required: self.min_rows,
            });
        }

        let records = Array2::from_shape_vec((n_rows, columns.len()), flat)
            .map_err(|e| ForecastError::SchemaMismatch(e.to_string()))?;

        Ok(FeatureMatrix {
            columns,
            records,
            targets: Array1::from_vec(targets),
            timestamps,
        })
    }
}

/// Schema realized by a set of observations: the continuous columns, then one
/// indicator per observed weekday except the lowest, which is the baseline.
pub fn feature_columns(observations: &[HourlyObservation]) -> Vec<FeatureColumn> {
    let observed_days: BTreeSet<u32> = observations.iter().map(|o| o.day_of_week).collect();

    FeatureColumn::CONTINUOUS
        .into_iter()
        .chain(
            observed_days
                .into_iter()
                .skip(1)
                .map(FeatureColumn::DayOfWeek),
        )
        .collect()
}

#[derive(Debug, Default, Clone, Copy)]
struct Sum {
    total: f64,
    seen: bool,
}

impl Sum {
    fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.total += v;
            self.seen = true;
        }
    }

    fn value(&self) -> Option<f64> {
        self.seen.then_some(self.total)
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    total: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.total += v;
            self.count += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total / self.count as f64)
    }
}

#[derive(Debug, Default)]
struct HourAccumulator {
    in_count: Sum,
    out_count: Sum,
    temperature: Mean,
    precipitation: Mean,
    cloud_cover: Mean,
}

/// Inner-join footfall rows to weather rows on the hourly timestamp, then
/// aggregate per hour in ascending order.
///
/// Many footfall rows may share one weather row; two weather rows for the
/// same hour is a [`ForecastError::DataIntegrity`] error.
pub fn join_and_aggregate(
    footfall: &[RawFootfallRecord],
    weather: &[RawWeatherRecord],
) -> Result<Vec<HourlyObservation>, ForecastError> {
    let mut weather_by_hour: HashMap<NaiveDateTime, &RawWeatherRecord> =
        HashMap::with_capacity(weather.len());
    for record in weather {
        let Some(timestamp) = record.timestamp else {
            continue;
        };
        if weather_by_hour.insert(timestamp, record).is_some() {
            return Err(ForecastError::DataIntegrity { timestamp });
        }
    }

    let mut hours: BTreeMap<NaiveDateTime, HourAccumulator> = BTreeMap::new();
    let mut joined = 0usize;

    for row in footfall {
        let Some(timestamp) = row.timestamp else {
            continue;
        };
        let Some(weather) = weather_by_hour.get(&timestamp) else {
            continue;
        };
        joined += 1;

        let acc = hours.entry(timestamp).or_default();
        acc.in_count.add(row.in_count.map(|v| v as f64));
        acc.out_count.add(row.out_count.map(|v| v as f64));
        acc.temperature.add(weather.temperature);
        acc.precipitation.add(weather.precipitation);
        acc.cloud_cover.add(weather.cloud_cover);
    }

    tracing::debug!(
        "Joined {} of {} footfall rows into {} hours",
        joined,
        footfall.len(),
        hours.len()
    );

    Ok(hours
        .into_iter()
        .map(|(timestamp, acc)| HourlyObservation {
            timestamp,
            in_count: acc.in_count.value(),
            out_count: acc.out_count.value(),
            temperature: acc.temperature.value(),
            precipitation: acc.precipitation.value(),
            cloud_cover: acc.cloud_cover.value(),
            hour_of_day: timestamp.hour(),
            day_of_week: timestamp.weekday().num_days_from_monday(),
        })
        .collect())
}

//! Time-series loader.
//!
//! Reads the footfall directory and the weather file into raw records keyed by
//! an hour-truncated timestamp. Parsing is lenient at the cell level: a bad
//! timestamp or count becomes `None` and is filtered once, after aggregation.
//! Only file-level problems (missing files, missing columns, unreadable CSV)
//! are errors here.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{NaiveDateTime, Timelike};
use csv::{ReaderBuilder, StringRecord};

use crate::config::{AppConfig, DatasetConfig, FootfallFormat, WeatherFormat};
use crate::error::ForecastError;

/// One row of a footfall file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFootfallRecord {
    /// `None` when the date/hour cells did not parse.
    pub timestamp: Option<NaiveDateTime>,
    pub in_count: Option<u64>,
    pub out_count: Option<u64>,
}

/// One row of the weather file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawWeatherRecord {
    pub timestamp: Option<NaiveDateTime>,
    pub temperature: Option<f64>,
    pub precipitation: Option<f64>,
    pub cloud_cover: Option<f64>,
}

/// Both raw series, ready for the feature builder.
#[derive(Debug, Clone, Default)]
pub struct TimeSeries {
    pub footfall: Vec<RawFootfallRecord>,
    pub weather: Vec<RawWeatherRecord>,
}

/// Load every footfall file and the weather file named by `config`.
pub fn load_sources(config: &AppConfig) -> Result<TimeSeries, ForecastError> {
    let footfall = load_footfall_dir(&config.datasets, &config.footfall)?;
    let weather = load_weather_file(&config.datasets.weather_file, &config.weather)?;

    tracing::info!(
        "Loaded {} footfall rows and {} weather rows",
        footfall.len(),
        weather.len()
    );

    Ok(TimeSeries { footfall, weather })
}

/// List footfall files in the configured directory, sorted by path.
pub fn discover_footfall_files(datasets: &DatasetConfig) -> Result<Vec<PathBuf>, ForecastError> {
    let dir = &datasets.footfall_dir;
    let entries = fs::read_dir(dir)
        .map_err(|e| ForecastError::data_source(dir, format!("cannot read directory: {e}")))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| ForecastError::data_source(dir, format!("cannot list directory: {e}")))?
            .path();
        let matches_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&datasets.footfall_extension));
        if path.is_file() && matches_extension {
            files.push(path);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(ForecastError::data_source(
            dir,
            format!("no *.{} footfall files found", datasets.footfall_extension),
        ));
    }

    Ok(files)
}

/// Parse and concatenate every footfall file. Duplicate hours across files are kept.
pub fn load_footfall_dir(
    datasets: &DatasetConfig,
    format: &FootfallFormat,
) -> Result<Vec<RawFootfallRecord>, ForecastError> {
    let files = discover_footfall_files(datasets)?;
    tracing::debug!("Found {} footfall files in {}", files.len(), datasets.footfall_dir.display());

    let mut records = Vec::new();
    for path in &files {
        let file = File::open(path)
            .map_err(|e| ForecastError::data_source(path, format!("cannot open: {e}")))?;
        let mut parsed = read_footfall(file, format, path)?;
        tracing::debug!("Parsed {} rows from {}", parsed.len(), path.display());
        records.append(&mut parsed);
    }

    Ok(records)
}

/// Parse footfall rows from any reader. `origin` names the source in errors.
pub fn read_footfall<R: Read>(
    reader: R,
    format: &FootfallFormat,
    origin: &Path,
) -> Result<Vec<RawFootfallRecord>, ForecastError> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|e| ForecastError::data_source(origin, format!("cannot read header: {e}")))?
        .clone();

    let date_idx = resolve_column(&headers, &format.date_column, origin)?;
    let hour_idx = resolve_column(&headers, &format.hour_column, origin)?;
    let in_idx = resolve_column(&headers, &format.in_column, origin)?;
    let out_idx = resolve_column(&headers, &format.out_column, origin)?;

    let mut records = Vec::new();
    let mut unparseable = 0usize;

    for row in rdr.records() {
        let row = row.map_err(|e| ForecastError::data_source(origin, format!("malformed row: {e}")))?;

        let timestamp = parse_footfall_timestamp(
            row.get(date_idx).unwrap_or(""),
            row.get(hour_idx).unwrap_or(""),
            &format.datetime_format,
        );
        if timestamp.is_none() {
            unparseable += 1;
        }

        records.push(RawFootfallRecord {
            timestamp,
            in_count: row.get(in_idx).and_then(parse_count),
            out_count: row.get(out_idx).and_then(parse_count),
        });
    }

    if unparseable > 0 {
        tracing::warn!(
            "{} footfall rows in {} have an unparseable date/hour",
            unparseable,
            origin.display()
        );
    }

    Ok(records)
}

/// Parse the weather file, skipping its metadata preamble.
pub fn load_weather_file(
    path: &Path,
    format: &WeatherFormat,
) -> Result<Vec<RawWeatherRecord>, ForecastError> {
    let file = File::open(path)
        .map_err(|e| ForecastError::data_source(path, format!("cannot open weather file: {e}")))?;
    read_weather(file, format, path)
}

/// Parse weather rows from any reader. `origin` names the source in errors.
pub fn read_weather<R: Read>(
    mut reader: R,
    format: &WeatherFormat,
    origin: &Path,
) -> Result<Vec<RawWeatherRecord>, ForecastError> {
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .map_err(|e| ForecastError::data_source(origin, format!("cannot read: {e}")))?;

    // Drop the preamble, then any blank separator lines ahead of the header.
    let body: Vec<&str> = text
        .lines()
        .skip(format.preamble_rows)
        .skip_while(|line| line.trim().is_empty())
        .collect();
    if body.is_empty() {
        return Err(ForecastError::data_source(origin, "no header row after preamble"));
    }
    let body = body.join("\n");

    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(body.as_bytes());
    let headers = rdr
        .headers()
        .map_err(|e| ForecastError::data_source(origin, format!("cannot read header: {e}")))?
        .clone();

    let columns = &format.columns;
    let time_idx = resolve_column(&headers, &columns.timestamp, origin)?;
    let temp_idx = resolve_column(&headers, &columns.temperature, origin)?;
    let precip_idx = resolve_column(&headers, &columns.precipitation, origin)?;
    let cloud_idx = resolve_column(&headers, &columns.cloud_cover, origin)?;

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row.map_err(|e| ForecastError::data_source(origin, format!("malformed row: {e}")))?;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        records.push(RawWeatherRecord {
            timestamp: row
                .get(time_idx)
                .and_then(|cell| parse_weather_timestamp(cell, &format.timestamp_formats)),
            temperature: row.get(temp_idx).and_then(parse_float),
            precipitation: row.get(precip_idx).and_then(parse_float),
            cloud_cover: row.get(cloud_idx).and_then(parse_float),
        });
    }

    Ok(records)
}

/// Find `wanted` among `headers`: an exact match wins, otherwise a header
/// whose text before a trailing `(unit)` suffix equals `wanted`.
pub fn resolve_column(
    headers: &StringRecord,
    wanted: &str,
    origin: &Path,
) -> Result<usize, ForecastError> {
    let cleaned: Vec<&str> = headers
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}'))
        .collect();

    cleaned
        .iter()
        .position(|h| *h == wanted)
        .or_else(|| cleaned.iter().position(|h| strip_unit_suffix(h) == wanted))
        .ok_or_else(|| {
            ForecastError::data_source(
                origin,
                format!("missing column '{wanted}' (found: {})", cleaned.join(", ")),
            )
        })
}

fn strip_unit_suffix(header: &str) -> &str {
    if header.ends_with(')')
        && let Some(open) = header.rfind('(')
    {
        return header[..open].trim_end();
    }
    header
}

/// Combine a date cell and an hour cell into an hourly timestamp.
///
/// A bare integer hour (`9`) is read as `09:00`.
pub fn parse_footfall_timestamp(date: &str, hour: &str, format: &str) -> Option<NaiveDateTime> {
    let date = date.trim();
    let hour = hour.trim();
    if date.is_empty() || hour.is_empty() {
        return None;
    }

    let hour = if hour.chars().all(|c| c.is_ascii_digit()) {
        format!("{hour}:00")
    } else {
        hour.to_string()
    };

    NaiveDateTime::parse_from_str(&format!("{date} {hour}"), format)
        .ok()
        .map(truncate_to_hour)
}

/// Parse a weather timestamp with the first format that accepts it.
pub fn parse_weather_timestamp(cell: &str, formats: &[String]) -> Option<NaiveDateTime> {
    let cell = cell.trim();
    formats
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(cell, f).ok())
        .map(truncate_to_hour)
}

/// Truncate a timestamp to the start of its hour.
pub fn truncate_to_hour(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_minute(0)
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

fn parse_count(cell: &str) -> Option<u64> {
    let cell = cell.trim();
    cell.parse::<u64>().ok().or_else(|| {
        let value = cell.parse::<f64>().ok()?;
        (value.is_finite() && value >= 0.0 && value.fract() == 0.0).then_some(value as u64)
    })
}

fn parse_float(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

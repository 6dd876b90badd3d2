use std::path::PathBuf;

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    pub datasets: DatasetConfig,
    pub footfall: FootfallFormat,
    pub weather: WeatherFormat,
    pub training: TrainingConfig,
    pub model: ModelStoreConfig,
}

/// Where the raw sources live on disk.
#[derive(Debug, Deserialize, Clone)]
pub struct DatasetConfig {
    pub footfall_dir: PathBuf,
    /// Files in `footfall_dir` with this extension are treated as footfall sources.
    pub footfall_extension: String,
    pub weather_file: PathBuf,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            footfall_dir: PathBuf::from("datasets/footfall"),
            footfall_extension: "csv".to_string(),
            weather_file: PathBuf::from("datasets/weather/weather.csv"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FootfallFormat {
    pub date_column: String,
    pub hour_column: String,
    pub in_column: String,
    pub out_column: String,
    /// Format of `"{date} {hour}"` once both cells are joined with a space.
    pub datetime_format: String,
}

impl Default for FootfallFormat {
    fn default() -> Self {
        Self {
            date_column: "Date".to_string(),
            hour_column: "Hour".to_string(),
            in_column: "InCount".to_string(),
            out_column: "OutCount".to_string(),
            datetime_format: "%d-%b-%y %H:%M".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeatherFormat {
    /// Lines ahead of the header row that carry station metadata.
    pub preamble_rows: usize,
    /// Tried in order until one parses.
    pub timestamp_formats: Vec<String>,
    pub columns: WeatherColumns,
}

impl Default for WeatherFormat {
    fn default() -> Self {
        Self {
            preamble_rows: 2,
            timestamp_formats: default_timestamp_formats(),
            columns: WeatherColumns::default(),
        }
    }
}

/// Expected weather field -> configured column name.
///
/// Names match a header exactly or up to a trailing unit suffix, so
/// `temperature_2m` resolves against `temperature_2m (°C)`.
#[derive(Debug, Deserialize, Clone)]
pub struct WeatherColumns {
    pub timestamp: String,
    pub temperature: String,
    pub precipitation: String,
    pub cloud_cover: String,
}

impl Default for WeatherColumns {
    fn default() -> Self {
        Self {
            timestamp: "time".to_string(),
            temperature: "temperature_2m".to_string(),
            precipitation: "precipitation".to_string(),
            cloud_cover: "cloud_cover".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct TrainingConfig {
    /// Minimum complete hourly rows needed before a fit is attempted.
    pub min_rows: usize,
    /// Leading share of the chronologically sorted rows used for fitting.
    pub train_fraction: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_rows: 20,
            train_fraction: 0.8,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ModelStoreConfig {
    /// Serve this persisted model instead of training from the datasets.
    pub path: Option<PathBuf>,
}

fn default_timestamp_formats() -> Vec<String> {
    [
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ]
    .iter()
    .map(|f| f.to_string())
    .collect()
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // Load .env file (silently ignore if not present)
        let _ = dotenvy::dotenv();

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("footfall-forecast");

        let builder = Config::builder()
            // 1. Defaults
            .set_default("datasets.footfall_dir", "datasets/footfall")?
            .set_default("datasets.footfall_extension", "csv")?
            .set_default("datasets.weather_file", "datasets/weather/weather.csv")?
            .set_default("footfall.date_column", "Date")?
            .set_default("footfall.hour_column", "Hour")?
            .set_default("footfall.in_column", "InCount")?
            .set_default("footfall.out_column", "OutCount")?
            .set_default("footfall.datetime_format", "%d-%b-%y %H:%M")?
            .set_default("weather.preamble_rows", 2)?
            .set_default("weather.timestamp_formats", default_timestamp_formats())?
            .set_default("weather.columns.timestamp", "time")?
            .set_default("weather.columns.temperature", "temperature_2m")?
            .set_default("weather.columns.precipitation", "precipitation")?
            .set_default("weather.columns.cloud_cover", "cloud_cover")?
            .set_default("training.min_rows", 20)?
            .set_default("training.train_fraction", 0.8)?
            .set_default("model.path", None::<String>)?
            // 2. Local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))
            // 3. User config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false))
            // 4. Environment variables (FOOTFALL__TRAINING__MIN_ROWS=...)
            .add_source(Environment::with_prefix("FOOTFALL").separator("__"));

        let s = builder.build()?;
        Ok(s.try_deserialize()?)
    }
}

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_PRODUCT_ID: u64 = 38955607;
pub const MAX_Y_AXIS_HEADROOM: f64 = 10.0;
pub const DEFAULT_ENDPOINT: &str = "https://www.digitec.ch/api/graphql/pdp-price-history";
pub const DEFAULT_CHART_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub product_id: u64,
    pub endpoint: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub poll_interval_secs: u64,
    /// A sample is flagged when its price is strictly below `threshold_ratio * average`.
    pub threshold_ratio: f64,
    /// Chart y-axis upper bound, as a factor of the highest valid price.
    pub y_axis_headroom: f64,
    /// Stable-sort samples by timestamp before analysis instead of trusting feed order.
    pub sort_by_timestamp: bool,
    pub output_dir: PathBuf,
    /// TTF used for the PNG's title and axis text. Unset or unreadable means
    /// the image is drawn without text.
    pub chart_font: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            product_id: DEFAULT_PRODUCT_ID,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            user_agent: "My-Scraper".to_string(),
            request_timeout_secs: 30,
            poll_interval_secs: 3600, // one hour
            threshold_ratio: 0.7,
            y_axis_headroom: 1.5,
            sort_by_timestamp: false,
            output_dir: PathBuf::from("."),
            chart_font: Some(PathBuf::from(DEFAULT_CHART_FONT)),
        }
    }
}

impl Config {
    /// Load a TOML config file. Fields missing from the file keep their defaults.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.threshold_ratio > 0.0 && self.threshold_ratio <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "threshold_ratio must be in (0, 1], got {}",
                self.threshold_ratio
            )));
        }
        if !(self.y_axis_headroom >= 1.0 && self.y_axis_headroom <= MAX_Y_AXIS_HEADROOM) {
            return Err(ConfigError::Invalid(format!(
                "y_axis_headroom must be in [1, {MAX_Y_AXIS_HEADROOM}], got {}",
                self.y_axis_headroom
            )));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("poll_interval_secs must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Percentage the threshold sits at, e.g. `70` for a ratio of 0.7.
    pub fn threshold_percent(&self) -> f64 {
        self.threshold_ratio * 100.0
    }

    /// Percentage a flagged price is below the average, e.g. `30` for a ratio of 0.7.
    pub fn drop_percent(&self) -> f64 {
        (1.0 - self.threshold_ratio) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_hourly_watcher() {
        let c = Config::default();
        assert_eq!(c.product_id, DEFAULT_PRODUCT_ID);
        assert_eq!(c.poll_interval(), Duration::from_secs(3600));
        assert_eq!(c.threshold_ratio, 0.7);
        assert_eq!(c.y_axis_headroom, 1.5);
        assert!(!c.sort_by_timestamp);
        c.validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = Config::from_toml_str("product_id = 42\nthreshold_ratio = 0.5\n").unwrap();
        assert_eq!(c.product_id, 42);
        assert_eq!(c.threshold_ratio, 0.5);
        assert_eq!(c.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(c.poll_interval_secs, 3600);
        assert_eq!(c.chart_font.as_deref(), Some(Path::new(DEFAULT_CHART_FONT)));
    }

    #[test]
    fn rejects_non_positive_ratio() {
        let err = Config::from_toml_str("threshold_ratio = 0.0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_ratio_above_the_average() {
        for ratio in ["1.5", "1e25", "inf", "nan"] {
            let err = Config::from_toml_str(&format!("threshold_ratio = {ratio}")).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "ratio {ratio} accepted");
        }
        Config::from_toml_str("threshold_ratio = 1.0").unwrap();
    }

    #[test]
    fn rejects_oversized_headroom() {
        let err = Config::from_toml_str("y_axis_headroom = 1e30").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_headroom_below_one() {
        let err = Config::from_toml_str("y_axis_headroom = 0.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_interval() {
        let err = Config::from_toml_str("poll_interval_secs = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_unparseable_toml() {
        let err = Config::from_toml_str("product_id = \"abc\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn percentages_follow_ratio() {
        let c = Config::default();
        assert_eq!(format!("{:.0}", c.threshold_percent()), "70");
        assert_eq!(format!("{:.0}", c.drop_percent()), "30");
    }
}

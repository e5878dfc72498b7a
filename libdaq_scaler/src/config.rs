use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::ConfigError;

/// Structure representing the driver configuration. Contains the bank group
/// selection, the data source, and clock overrides.
/// Configs are serializable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bank group to aggregate ("Left", "Right", "evleft", ...).
    pub bank_group: String,
    /// Date the channel mapping should be valid for, `dd-mm-yyyy` or `now`.
    pub map_date: String,
    /// Data file to replay.
    pub data_path: Option<PathBuf>,
    /// Scaler history file, used with `run_number`.
    pub history_path: Option<PathBuf>,
    pub run_number: Option<u32>,
    /// Fetch counters from the online server instead of a file.
    pub online: bool,
    /// Online server override; the bank table default applies when unset.
    pub server: Option<String>,
    pub port: Option<u16>,
    /// Clock configuration overrides.
    pub clock_rate: Option<f64>,
    pub clock_slot: Option<u8>,
    pub clock_chan: Option<u8>,
    /// Fixed seconds between extractions, when the stream has no clock.
    pub time_interval: Option<f64>,
    /// Decode FADC data of one module while replaying.
    pub fadc_crate: Option<u8>,
    pub fadc_slot: Option<u8>,
    pub fadc_channel: Option<u8>,
    pub fadc_mode: Option<u8>,
}

impl Default for Config {
    /// Generate a new Config object. Fields hold placeholder values
    fn default() -> Self {
        Self {
            bank_group: String::from("Left"),
            map_date: String::from("now"),
            data_path: None,
            history_path: None,
            run_number: None,
            online: false,
            server: None,
            port: None,
            clock_rate: None,
            clock_slot: None,
            clock_chan: None,
            time_interval: None,
            fadc_crate: None,
            fadc_slot: None,
            fadc_channel: None,
            fadc_mode: None,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    pub fn has_data_file(&self) -> bool {
        self.data_path.is_some()
    }

    pub fn has_history(&self) -> bool {
        self.history_path.is_some() && self.run_number.is_some()
    }

    pub fn wants_fadc(&self) -> bool {
        self.fadc_crate.is_some() && self.fadc_slot.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_yaml_round_trip() {
        let mut config = Config::default();
        config.bank_group = String::from("evright");
        config.map_date = String::from("20-01-2003");
        config.run_number = Some(1287);
        let yaml_str = serde_yaml::to_string(&config).expect("could not serialize config");

        let mut file = tempfile::NamedTempFile::new().expect("could not create temp file");
        file.write_all(yaml_str.as_bytes())
            .expect("could not write yaml");
        let read_back = Config::read_config_file(file.path()).unwrap();
        assert_eq!(read_back.bank_group, "evright");
        assert_eq!(read_back.map_date, "20-01-2003");
        assert_eq!(read_back.run_number, Some(1287));
        assert!(!read_back.online);
    }

    #[test]
    fn test_missing_config_file() {
        assert!(matches!(
            Config::read_config_file(Path::new("/no/such/config.yaml")),
            Err(ConfigError::BadFilePath(_))
        ));
    }
}

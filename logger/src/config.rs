use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_BAUD: u32 = 115_200;
const DEFAULT_WAIT_SECS: u64 = 60;

/// Partial settings from one source (YAML file or CLI flags); absent
/// fields fall through to the next source.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LoggerConfig {
    pub port: Option<String>,
    pub baud: Option<u32>,
    pub log_dir: Option<PathBuf>,
    pub wait_for_port: Option<u64>,
}

impl LoggerConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading logger config {}", path_ref.display()))?;
        let config: LoggerConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing logger config {}", path_ref.display()))?;
        Ok(config)
    }
}

/// Fully resolved settings: CLI flags win over config-file values, both
/// win over the built-in defaults.
#[derive(Clone, Debug)]
pub struct Settings {
    pub port: Option<String>,
    pub baud: u32,
    pub log_dir: PathBuf,
    pub wait_for_port: Duration,
}

impl Settings {
    pub fn merge(cli: LoggerConfig, file: LoggerConfig) -> Self {
        Self {
            port: cli.port.or(file.port),
            baud: cli.baud.or(file.baud).unwrap_or(DEFAULT_BAUD),
            log_dir: cli
                .log_dir
                .or(file.log_dir)
                .unwrap_or_else(default_log_dir),
            wait_for_port: Duration::from_secs(
                cli.wait_for_port
                    .or(file.wait_for_port)
                    .unwrap_or(DEFAULT_WAIT_SECS),
            ),
        }
    }
}

fn default_log_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join("lora_data_logs"))
        .unwrap_or_else(|| PathBuf::from("lora_data_logs"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn merge_prefers_cli_over_file_over_defaults() {
        let cli = LoggerConfig {
            baud: Some(9600),
            ..Default::default()
        };
        let file = LoggerConfig {
            port: Some("/dev/ttyACM1".to_string()),
            baud: Some(57_600),
            wait_for_port: Some(10),
            ..Default::default()
        };
        let settings = Settings::merge(cli, file);
        assert_eq!(settings.baud, 9600);
        assert_eq!(settings.port.as_deref(), Some("/dev/ttyACM1"));
        assert_eq!(settings.wait_for_port, Duration::from_secs(10));
    }

    #[test]
    fn merge_of_empty_sources_yields_defaults() {
        let settings = Settings::merge(LoggerConfig::default(), LoggerConfig::default());
        assert_eq!(settings.baud, 115_200);
        assert_eq!(settings.port, None);
        assert_eq!(settings.wait_for_port, Duration::from_secs(60));
        assert!(settings.log_dir.ends_with("lora_data_logs"));
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"port: /dev/ttyUSB0\nbaud: 57600\nlog_dir: /tmp/lora\n")
            .unwrap();
        let path = temp.into_temp_path();
        let config = LoggerConfig::load(&path).unwrap();
        assert_eq!(config.port.as_deref(), Some("/dev/ttyUSB0"));
        assert_eq!(config.baud, Some(57_600));
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/lora")));
        assert_eq!(config.wait_for_port, None);
    }
}

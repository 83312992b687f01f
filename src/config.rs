//! Process configuration: the `UTIM_CONFIG` INI file plus the
//! `UTIM_MASTER_KEY` environment variable, §6.1.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_CONFIG_PATH: &str = "config.ini";
const DEFAULT_RECONNECT_TIME: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessagingProtocol {
    Mqtt,
    Amqp,
    Umqtt,
}

#[derive(Debug, Deserialize)]
struct UtimSection {
    utimname: String,
    uhostname: String,
    messaging_protocol: String,
}

#[derive(Debug, Deserialize)]
struct BrokerSection {
    hostname: String,
    username: String,
    password: String,
    #[serde(default)]
    reconnect_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "UTIM")]
    utim: UtimSection,
    #[serde(rename = "MQTT", default)]
    mqtt: Option<BrokerSection>,
    #[serde(rename = "AMQP", default)]
    amqp: Option<BrokerSection>,
    #[serde(rename = "UMQTT", default)]
    umqtt: Option<BrokerSection>,
}

/// Immutable configuration record, loaded once at startup and passed by
/// reference to every component that needs it (§9 Design Notes).
#[derive(Debug, Clone)]
pub struct UtimConfig {
    pub utim_name: String,
    pub uhost_name: String,
    pub messaging_protocol: MessagingProtocol,
    pub broker_hostname: String,
    pub broker_username: String,
    pub broker_password: String,
    pub reconnect_time: u32,
    pub master_key: Vec<u8>,
}

impl UtimConfig {
    /// Loads the INI file named by `UTIM_CONFIG` (default `config.ini`) and
    /// the `UTIM_MASTER_KEY` environment variable.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("UTIM_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let master_key_hex = env::var("UTIM_MASTER_KEY").map_err(|_| ConfigError::MissingMasterKey)?;
        let master_key = hex::decode(master_key_hex.trim())?;
        Self::load_from(Path::new(&path), master_key)
    }

    /// Loads from an explicit path and master key, used by tests and by
    /// [`UtimConfig::load`].
    pub fn load_from(path: &Path, master_key: Vec<u8>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display_path(path),
            source,
        })?;
        let raw: RawConfig = serde_ini::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: display_path(path),
            source,
        })?;

        let messaging_protocol = match raw.utim.messaging_protocol.to_lowercase().as_str() {
            "mqtt" => MessagingProtocol::Mqtt,
            "amqp" => MessagingProtocol::Amqp,
            "umqtt" => MessagingProtocol::Umqtt,
            other => return Err(ConfigError::UnknownMessagingProtocol(other.to_string())),
        };

        let broker = match messaging_protocol {
            MessagingProtocol::Mqtt => raw.mqtt.as_ref(),
            MessagingProtocol::Amqp => raw.amqp.as_ref(),
            MessagingProtocol::Umqtt => raw.umqtt.as_ref(),
        }
        .ok_or_else(|| ConfigError::UnknownMessagingProtocol(raw.utim.messaging_protocol.clone()))?;

        let reconnect_time = broker
            .reconnect_time
            .as_deref()
            .and_then(|v| v.trim().parse::<u32>().ok())
            .unwrap_or(DEFAULT_RECONNECT_TIME);

        Ok(UtimConfig {
            utim_name: raw.utim.utimname,
            uhost_name: raw.utim.uhostname,
            messaging_protocol,
            broker_hostname: broker.hostname.clone(),
            broker_username: broker.username.clone(),
            broker_password: broker.password.clone(),
            reconnect_time,
            master_key,
        })
    }
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Resolves the configured path without reading it, exposed for callers
/// that want to report the effective path in diagnostics.
pub fn effective_config_path() -> PathBuf {
    PathBuf::from(env::var("UTIM_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp config file");
        file.write_all(body.as_bytes()).expect("write temp config file");
        file
    }

    const WELL_FORMED: &str = "\
[UTIM]
utimname = A1B2C3
uhostname = D4E5F6
messaging_protocol = mqtt

[MQTT]
hostname = broker.example.com
username = utim
password = secret
reconnect_time = 30
";

    #[test]
    fn loads_well_formed_file() {
        let file = write_config(WELL_FORMED);
        let config = UtimConfig::load_from(file.path(), vec![0xde, 0xad]).unwrap();
        assert_eq!(config.utim_name, "A1B2C3");
        assert_eq!(config.messaging_protocol, MessagingProtocol::Mqtt);
        assert_eq!(config.reconnect_time, 30);
        assert_eq!(config.master_key, vec![0xde, 0xad]);
    }

    #[test]
    fn falls_back_to_default_reconnect_time_on_parse_failure() {
        let body = WELL_FORMED.replace("reconnect_time = 30", "reconnect_time = not-a-number");
        let file = write_config(&body);
        let config = UtimConfig::load_from(file.path(), vec![]).unwrap();
        assert_eq!(config.reconnect_time, DEFAULT_RECONNECT_TIME);
    }

    #[test]
    fn rejects_unknown_messaging_protocol() {
        let body = WELL_FORMED.replace("messaging_protocol = mqtt", "messaging_protocol = carrier-pigeon");
        let file = write_config(&body);
        let err = UtimConfig::load_from(file.path(), vec![]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMessagingProtocol(_)));
    }

    #[test]
    fn missing_master_key_env_var_is_an_error() {
        env::remove_var("UTIM_MASTER_KEY");
        assert!(matches!(
            UtimConfig::load().unwrap_err(),
            ConfigError::MissingMasterKey
        ));
    }

    #[test]
    fn invalid_master_key_hex_is_an_error() {
        env::set_var("UTIM_MASTER_KEY", "not-hex-zz");
        let result = UtimConfig::load();
        env::remove_var("UTIM_MASTER_KEY");
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidMasterKeyHex(_)
        ));
    }
}

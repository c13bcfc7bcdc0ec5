use crate::defaults;
use crate::error::{AdvisorError, Result};
use crate::service::types::Persona;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub session: SessionConfig,
    pub playback: PlaybackConfig,
    pub status: StatusConfig,
}

/// Diagnosis service connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    /// Device model sent with each diagnosis
    pub device: String,
}

/// Interactive session behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub persona: Persona,
    /// Request the explanatory video after each diagnosis
    pub video: bool,
    /// External speech-to-text command; empty means typed input only
    pub capture_command: String,
}

/// Video playback controls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    pub rewind_seconds: f64,
    pub tick_ms: u64,
    /// Start playing as soon as the video arrives
    pub autoplay: bool,
    /// Play narration through the speaker (needs the `cpal-audio` feature)
    pub audio: bool,
}

/// Manual registry status polling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StatusConfig {
    pub poll_interval_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::BASE_URL.to_string(),
            device: defaults::DEVICE.to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            persona: Persona::default(),
            video: true,
            capture_command: String::new(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            rewind_seconds: defaults::REWIND_SECONDS,
            tick_ms: defaults::TICK_MS,
            autoplay: false,
            audio: true,
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: defaults::STATUS_POLL_SECS,
        }
    }
}

const TEMPLATE: &str = r#"# advisor configuration
# Location: ~/.config/advisor/config.toml
# Every key is optional; missing keys use the values shown here.

[service]
# Base URL of the diagnosis service (env: ADVISOR_API_URL)
base_url = "http://localhost:8000"
# Device model the manual covers (env: ADVISOR_DEVICE)
device = "TS6330"

[session]
# Technical | Presenter | Instructor (env: ADVISOR_PERSONA)
persona = "Technical"
# Request the narrated slide video after each diagnosis
video = true
# Speech-to-text command run once per capture; stdout is the question.
# Leave empty to type questions instead, e.g. "listen --once"
capture_command = ""

[playback]
# Seconds jumped back by :rewind
rewind_seconds = 10.0
# How often the slide display follows the narration (milliseconds)
tick_ms = 250
# Start playing as soon as the video arrives
autoplay = false
# Play the narration through the speaker; false shows slides silently
audio = true

[status]
# Poll interval for `advisor status --watch` (seconds)
poll_interval_secs = 5
"#;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file is missing, contains invalid TOML,
    /// or holds invalid values. Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AdvisorError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                AdvisorError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(AdvisorError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - ADVISOR_API_URL → service.base_url
    /// - ADVISOR_PERSONA → session.persona
    /// - ADVISOR_DEVICE → service.device
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("ADVISOR_API_URL")
            && !url.is_empty()
        {
            self.service.base_url = url;
        }

        if let Ok(persona) = std::env::var("ADVISOR_PERSONA")
            && !persona.is_empty()
        {
            match persona.parse() {
                Ok(persona) => self.session.persona = persona,
                Err(e) => eprintln!("advisor: ignoring ADVISOR_PERSONA: {e}"),
            }
        }

        if let Ok(device) = std::env::var("ADVISOR_DEVICE")
            && !device.is_empty()
        {
            self.service.device = device;
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/advisor/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("advisor")
            .join("config.toml")
    }

    /// Reject values that would break a session at runtime.
    pub fn validate(&self) -> Result<()> {
        let url = self.service.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(invalid("service.base_url", "must start with http:// or https://"));
        }
        if !(self.playback.rewind_seconds.is_finite() && self.playback.rewind_seconds > 0.0) {
            return Err(invalid("playback.rewind_seconds", "must be a positive number"));
        }
        if self.playback.tick_ms == 0 {
            return Err(invalid("playback.tick_ms", "must be greater than 0"));
        }
        if self.status.poll_interval_secs == 0 {
            return Err(invalid("status.poll_interval_secs", "must be greater than 0"));
        }
        Ok(())
    }

    /// Read one value by dotted path (e.g. `session.persona`).
    pub fn get_value_by_path(&self, key: &str) -> Result<String> {
        let root = toml::Value::try_from(self).map_err(ser_error)?;
        let value = lookup(&root, key).ok_or_else(|| AdvisorError::ConfigUnknownKey {
            key: key.to_string(),
        })?;
        Ok(match value {
            toml::Value::String(s) => s.clone(),
            toml::Value::Table(table) => toml::to_string(table).map_err(ser_error)?,
            other => other.to_string(),
        })
    }

    /// Set one value by dotted path in the file at `path`.
    ///
    /// The value's type follows the existing field. The file is created if
    /// missing; other keys and sections are preserved.
    pub fn set_value_by_path(path: &Path, key: &str, value: &str) -> Result<()> {
        let (section, field) = key.split_once('.').ok_or_else(|| AdvisorError::ConfigUnknownKey {
            key: key.to_string(),
        })?;

        let template = toml::Value::try_from(Config::default()).map_err(ser_error)?;
        let current = lookup(&template, key).ok_or_else(|| AdvisorError::ConfigUnknownKey {
            key: key.to_string(),
        })?;
        let parsed = parse_like(current, key, value)?;

        let mut table: toml::Table = match fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => toml::Table::new(),
            Err(e) => return Err(AdvisorError::Io(e)),
        };

        let entry = table
            .entry(section.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        match entry {
            toml::Value::Table(section_table) => {
                section_table.insert(field.to_string(), parsed);
            }
            _ => {
                return Err(AdvisorError::ConfigParse {
                    message: format!("[{section}] is not a table"),
                });
            }
        }

        let config: Config = toml::Value::Table(table.clone()).try_into()?;
        config.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(&table).map_err(ser_error)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Render one section as TOML.
    pub fn display_section(&self, section: &str) -> Result<String> {
        let root = toml::Value::try_from(self).map_err(ser_error)?;
        match root.get(section) {
            Some(toml::Value::Table(table)) => {
                let mut wrapper = toml::Table::new();
                wrapper.insert(section.to_string(), toml::Value::Table(table.clone()));
                toml::to_string_pretty(&wrapper).map_err(ser_error)
            }
            _ => Err(AdvisorError::ConfigUnknownKey {
                key: section.to_string(),
            }),
        }
    }

    /// Render the whole configuration as TOML.
    pub fn to_display_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(ser_error)
    }

    /// Commented template with every key at its default.
    pub fn dump_template() -> &'static str {
        TEMPLATE
    }
}

fn invalid(key: &str, message: &str) -> AdvisorError {
    AdvisorError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn ser_error(e: toml::ser::Error) -> AdvisorError {
    AdvisorError::ConfigParse {
        message: e.to_string(),
    }
}

fn lookup<'a>(root: &'a toml::Value, key: &str) -> Option<&'a toml::Value> {
    key.split('.')
        .try_fold(root, |value, part| value.as_table()?.get(part))
}

fn parse_like(current: &toml::Value, key: &str, raw: &str) -> Result<toml::Value> {
    let raw = raw.trim();
    match current {
        toml::Value::Boolean(_) => raw
            .parse::<bool>()
            .map(toml::Value::Boolean)
            .map_err(|_| invalid(key, "expected true or false")),
        toml::Value::Integer(_) => raw
            .parse::<i64>()
            .map(toml::Value::Integer)
            .map_err(|_| invalid(key, "expected an integer")),
        toml::Value::Float(_) => raw
            .parse::<f64>()
            .map(toml::Value::Float)
            .map_err(|_| invalid(key, "expected a number")),
        toml::Value::String(_) => Ok(toml::Value::String(raw.to_string())),
        _ => Err(AdvisorError::ConfigUnknownKey {
            key: key.to_string(),
        }),
    }
}

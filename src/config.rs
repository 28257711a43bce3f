//! # Configuration Management
//!
//! Centralized configuration for the LDAP core.
//!
//! This module provides structured configuration for the codec limits, the
//! LDIF reader and writer, schema defaults and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides (`LDAP_CORE_*`)
//!
//! ## Limits
//! - Default maximum element size (16 MB) bounds memory per decoded message
//! - Default nesting depth (64) bounds recursion in filters and TLV trees

use crate::error::{LdapError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::Level;

/// Max allowed size of one BER element (16 MB)
pub const MAX_ELEMENT_SIZE: usize = 16 * 1024 * 1024;

/// Max nesting of constructed elements
pub const MAX_NESTING_DEPTH: usize = 64;

/// OID of the Directory String syntax
pub const DIRECTORY_STRING_SYNTAX_OID: &str = "1.3.6.1.4.1.1466.115.121.1.15";

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CoreConfig {
    /// BER codec limits
    #[serde(default)]
    pub codec: CodecConfig,

    /// LDIF reader and writer options
    #[serde(default)]
    pub ldif: LdifConfig,

    /// Schema defaults
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CoreConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| LdapError::Config(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| LdapError::Config(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| LdapError::Config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `LDAP_CORE_*` overrides read through `lookup`.
    ///
    /// Unparseable values are ignored and the previous setting kept.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("LDAP_CORE_MAX_ELEMENT_SIZE").and_then(|v| v.parse().ok()) {
            self.codec.max_element_size = val;
        }

        if let Some(val) = lookup("LDAP_CORE_MAX_NESTING_DEPTH").and_then(|v| v.parse().ok()) {
            self.codec.max_nesting_depth = val;
        }

        if let Some(val) = lookup("LDAP_CORE_LDIF_WRAP_COLUMN").and_then(|v| v.parse().ok()) {
            self.ldif.wrap_column = val;
        }

        if let Some(val) = lookup("LDAP_CORE_LDIF_COMMENTS").and_then(|v| parse_bool(&v)) {
            self.ldif.add_user_friendly_comments = val;
        }

        if let Some(val) = lookup("LDAP_CORE_LDIF_RESOLVE_URLS").and_then(|v| parse_bool(&v)) {
            self.ldif.resolve_url_values = val;
        }

        if let Some(oid) = lookup("LDAP_CORE_DEFAULT_SYNTAX") {
            self.schema.default_syntax_oid = oid;
        }

        if let Some(val) = lookup("LDAP_CORE_STRICT_VALUES").and_then(|v| parse_bool(&v)) {
            self.schema.strict_values = val;
        }

        if let Some(level) = lookup("LDAP_CORE_LOG_LEVEL").and_then(|v| v.parse::<Level>().ok()) {
            self.logging.log_level = level;
        }
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| LdapError::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| LdapError::Config(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.codec.validate());
        errors.extend(self.ldif.validate());
        errors.extend(self.schema.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(LdapError::Config(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// BER codec limits
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Largest element (header included) accepted from a stream or frame
    pub max_element_size: usize,

    /// Deepest nesting of constructed elements accepted
    pub max_nesting_depth: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_element_size: MAX_ELEMENT_SIZE,
            max_nesting_depth: MAX_NESTING_DEPTH,
        }
    }
}

impl CodecConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_element_size < 64 {
            errors.push(format!(
                "Max element size too small: {} bytes (minimum: 64)",
                self.max_element_size
            ));
        } else if self.max_element_size > u32::MAX as usize {
            errors.push(format!(
                "Max element size too large: {} bytes (lengths are limited to 4 octets)",
                self.max_element_size
            ));
        }

        if self.max_nesting_depth == 0 {
            errors.push("Max nesting depth must be greater than 0".to_string());
        } else if self.max_nesting_depth > 1024 {
            errors.push(format!(
                "Max nesting depth too large: {} (maximum: 1024)",
                self.max_nesting_depth
            ));
        }

        errors
    }
}

/// LDIF reader and writer options
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LdifConfig {
    /// Column at which long lines are folded; 0 disables folding
    pub wrap_column: usize,

    /// Precede base64 values holding non-ASCII text with a `#` comment
    pub add_user_friendly_comments: bool,

    /// Let the reader resolve `:<` file URLs
    pub resolve_url_values: bool,
}

impl LdifConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        // a continuation line is a space plus at least one character
        if self.wrap_column == 1 {
            errors.push("Wrap column 1 cannot hold a continuation line (use 0 or at least 2)".to_string());
        }

        errors
    }
}

/// Schema defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Syntax assumed for attribute types missing from the schema
    pub default_syntax_oid: String,

    /// Validate values read from LDIF when a schema is attached
    pub strict_values: bool,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            default_syntax_oid: DIRECTORY_STRING_SYNTAX_OID.to_string(),
            strict_values: true,
        }
    }
}

impl SchemaConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.default_syntax_oid.is_empty() {
            errors.push("Default syntax OID cannot be empty".to_string());
        } else if !is_numeric_oid(&self.default_syntax_oid) {
            errors.push(format!(
                "Invalid default syntax OID: '{}' (expected dotted decimal)",
                self.default_syntax_oid
            ));
        }

        errors
    }
}

fn is_numeric_oid(oid: &str) -> bool {
    oid.split('.')
        .all(|arc| !arc.is_empty() && arc.bytes().all(|b| b.is_ascii_digit()))
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("ldap-core"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(CoreConfig::default().validate().is_empty());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = CoreConfig::default();
        config.apply_env(|key| match key {
            "LDAP_CORE_LDIF_WRAP_COLUMN" => Some("76".to_string()),
            "LDAP_CORE_STRICT_VALUES" => Some("off".to_string()),
            "LDAP_CORE_MAX_NESTING_DEPTH" => Some("not-a-number".to_string()),
            _ => None,
        });
        assert_eq!(config.ldif.wrap_column, 76);
        assert!(!config.schema.strict_values);
        assert_eq!(config.codec.max_nesting_depth, MAX_NESTING_DEPTH);
    }

    #[test]
    fn test_numeric_oid_check() {
        assert!(is_numeric_oid("1.3.6.1"));
        assert!(!is_numeric_oid("1..3"));
        assert!(!is_numeric_oid("cn"));
    }
}

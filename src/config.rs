//! Connection configuration
//!
//! This module turns the flat string map every front end sends into a typed
//! [`SourceConfig`], and describes the configuration form shown to users.

use crate::error::{Error, Result};
use crate::types::{JsonValue, OptionStringExt, StringMap};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Source Config
// ============================================================================

/// Connection settings for one SingleStore table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub table: String,
    pub user: String,
    pub password: Option<String>,
    pub ssl_mode: SslMode,
    /// PEM text, re-flowed into lines
    pub ssl_server_cert: Option<String>,
    pub driver_parameters: DriverParameters,
}

impl SourceConfig {
    /// Build from a flat key/value map
    pub fn from_map(map: &StringMap) -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            map.get(key)
                .cloned()
                .none_if_empty()
                .ok_or_else(|| Error::missing_field(key))
        };
        let optional = |key: &str| map.get(key).cloned().none_if_empty();

        let port_text = required("port")?;
        let port = port_text
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| Error::invalid_value("port", format!("'{port_text}' is not a valid port")))?;

        let ssl_mode = optional("ssl.mode")
            .map(|mode| mode.parse::<SslMode>())
            .transpose()?
            .unwrap_or_default();

        let driver_parameters = optional("driver.parameters")
            .map(|params| DriverParameters::parse(&params))
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            host: required("host")?,
            port,
            database: required("database")?,
            table: required("table")?,
            user: required("user")?,
            password: optional("password"),
            ssl_mode,
            ssl_server_cert: optional("ssl.server.cert").map(|cert| format_server_cert(&cert)),
            driver_parameters,
        })
    }

    /// Build from a JSON object whose scalar values are stringified
    pub fn from_json_value(value: &JsonValue) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::config("configuration must be an object"))?;

        let map = object
            .iter()
            .filter_map(|(key, value)| {
                let text = match value {
                    JsonValue::Null => return None,
                    JsonValue::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Some((key.clone(), text))
            })
            .collect::<StringMap>();

        Self::from_map(&map)
    }

    /// Parse inline JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_json_value(&serde_json::from_str(json)?)
    }

    /// Load from a JSON or YAML file, chosen by extension
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| matches!(ext, "yaml" | "yml"));

        let value: JsonValue = if is_yaml {
            serde_yaml::from_str(&contents)?
        } else {
            serde_json::from_str(&contents)?
        };
        Self::from_json_value(&value)
    }
}

/// Re-flow a certificate pasted on a single line back into PEM lines
fn format_server_cert(cert: &str) -> String {
    const BEGIN: &str = "-----BEGIN CERTIFICATE-----";
    const END: &str = "-----END CERTIFICATE-----";
    const BEGIN_MARK: &str = "-----BEGIN-CERTIFICATE-----";
    const END_MARK: &str = "-----END-CERTIFICATE-----";

    cert.replace(BEGIN, BEGIN_MARK)
        .replace(END, END_MARK)
        .replace(' ', "\n")
        .replace(BEGIN_MARK, BEGIN)
        .replace(END_MARK, END)
}

// ============================================================================
// SSL Mode
// ============================================================================

/// Transport encryption mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    /// Unencrypted connection
    #[default]
    Disable,
    /// Encrypted, no certificate or hostname validation
    Trust,
    /// Encrypted, certificate validated against the configured CA
    VerifyCa,
    /// Like `VerifyCa`, plus hostname validation
    VerifyFull,
}

impl SslMode {
    pub const ALL: [SslMode; 4] = [
        SslMode::Disable,
        SslMode::Trust,
        SslMode::VerifyCa,
        SslMode::VerifyFull,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SslMode::Disable => "disable",
            SslMode::Trust => "trust",
            SslMode::VerifyCa => "verify-ca",
            SslMode::VerifyFull => "verify-full",
        }
    }
}

impl FromStr for SslMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SslMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s.trim())
            .ok_or_else(|| {
                Error::invalid_value(
                    "ssl.mode",
                    format!("'{s}' is not one of disable, trust, verify-ca, verify-full"),
                )
            })
    }
}

impl std::fmt::Display for SslMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Driver Parameters
// ============================================================================

/// Extra connection parameters given as `k1=v1; k2 = v2`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverParameters {
    /// Bound on connection establishment
    pub connect_timeout: Option<Duration>,
    /// TCP keepalive interval in milliseconds
    pub tcp_keep_alive: Option<u32>,
    /// Session `wait_timeout` in seconds
    pub wait_timeout: Option<usize>,
    pub stmt_cache_size: Option<usize>,
    pub compression: bool,
}

impl DriverParameters {
    /// Parse the `driver.parameters` value
    pub fn parse(text: &str) -> Result<Self> {
        let mut params = Self::default();

        for entry in text.split(';') {
            if entry.trim().is_empty() {
                continue;
            }
            let (key, value) = match entry.split('=').collect::<Vec<_>>()[..] {
                [key, value] => (key.trim(), value.trim()),
                _ => return Err(Error::config("Invalid value of `driverParameters` configuration")),
            };
            if key.is_empty() || value.is_empty() {
                continue;
            }

            let invalid = |e: &dyn std::fmt::Display| {
                Error::invalid_value("driver.parameters", format!("{key}: {e}"))
            };
            match key {
                "connectTimeout" => {
                    let ms = value.parse::<u64>().map_err(|e| invalid(&e))?;
                    params.connect_timeout = Some(Duration::from_millis(ms));
                }
                "tcpKeepAlive" => {
                    params.tcp_keep_alive = Some(value.parse().map_err(|e| invalid(&e))?);
                }
                "waitTimeout" => {
                    params.wait_timeout = Some(value.parse().map_err(|e| invalid(&e))?);
                }
                "stmtCacheSize" => {
                    params.stmt_cache_size = Some(value.parse().map_err(|e| invalid(&e))?);
                }
                "compression" => {
                    params.compression = value.parse().map_err(|e| invalid(&e))?;
                }
                other => {
                    return Err(Error::invalid_value(
                        "driver.parameters",
                        format!("unsupported parameter '{other}'"),
                    ))
                }
            }
        }

        Ok(params)
    }
}

// ============================================================================
// Configuration Form
// ============================================================================

/// Fields and tests presented to a user setting up the connector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationForm {
    pub schema_selection_supported: bool,
    pub table_selection_supported: bool,
    pub fields: Vec<FormField>,
    pub tests: Vec<ConfigurationTest>,
}

/// One input on the configuration form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub label: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub kind: FieldKind,
    /// Only shown when another field holds one of these values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_when: Option<VisibilityCondition>,
}

/// Input widget for a form field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Password,
    Dropdown { options: Vec<String> },
}

/// Visibility rule for a conditional field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityCondition {
    pub field: String,
    pub values: Vec<String>,
}

/// A named connection test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationTest {
    pub name: String,
    pub label: String,
}

/// Name of the connectivity test
pub const TEST_CONNECT: &str = "connect";
/// Name of the table existence test
pub const TEST_TABLE: &str = "table";

impl FormField {
    fn text(name: &str, label: &str, required: bool) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            required,
            description: None,
            kind: FieldKind::Text,
            visible_when: None,
        }
    }

    #[must_use]
    fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    #[must_use]
    fn with_kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }
}

/// The static configuration form
pub fn configuration_form() -> ConfigurationForm {
    let ssl_modes = SslMode::ALL.iter().map(|m| m.as_str().to_string()).collect::<Vec<_>>();

    let server_cert = FormField {
        visible_when: Some(VisibilityCondition {
            field: "ssl.mode".to_string(),
            values: ssl_modes[1..].to_vec(),
        }),
        ..FormField::text("ssl.server.cert", "SSL Server's Certificate", false).with_description(
            "Server's certificate in PEM format or the server's CA certificate. \
             The certificate is added to the trusted roots, which allows the connection to trust a self-signed certificate.",
        )
    };

    ConfigurationForm {
        schema_selection_supported: true,
        table_selection_supported: true,
        fields: vec![
            FormField::text("host", "Host", true),
            FormField::text("port", "Port", true),
            FormField::text("database", "Database", true),
            FormField::text("table", "Table", true),
            FormField::text("user", "Username", true),
            FormField::text("password", "Password", false).with_kind(FieldKind::Password),
            FormField::text("ssl.mode", "SSL mode", false)
                .with_description(
                    "Whether to use an encrypted connection to SingleStore.\n\
                     Options include:\n \
                     * 'disable' to use an unencrypted connection (the default);\n \
                     * 'trust' to use a secure (encrypted) connection (no certificate and hostname validation);\n \
                     * 'verify-ca' to use a secure (encrypted) connection but additionally verify the server TLS certificate against the configured Certificate Authority (CA) certificates;\n \
                     * 'verify-full' like 'verify-ca' but additionally verify that the server certificate matches the host to which the connection is attempted.",
                )
                .with_kind(FieldKind::Dropdown { options: ssl_modes }),
            server_cert,
            FormField::text("driver.parameters", "Driver Parameters", false).with_description(
                "Additional connection parameters.\n\
                 Format: 'param1=value1; param2 = value2; ...'.\n\
                 Supported: connectTimeout (ms), tcpKeepAlive (ms), waitTimeout (s), stmtCacheSize, compression (true/false).",
            ),
        ],
        tests: vec![
            ConfigurationTest {
                name: TEST_CONNECT.to_string(),
                label: "Tests connection".to_string(),
            },
            ConfigurationTest {
                name: TEST_TABLE.to_string(),
                label: "Tests table existence".to_string(),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base_map() -> StringMap {
        [
            ("host", "127.0.0.1"),
            ("port", "3306"),
            ("database", "db"),
            ("table", "events"),
            ("user", "root"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = SourceConfig::from_map(&base_map()).unwrap();
        assert_eq!(config.port, 3306);
        assert_eq!(config.password, None);
        assert_eq!(config.ssl_mode, SslMode::Disable);
        assert_eq!(config.ssl_server_cert, None);
        assert_eq!(config.driver_parameters, DriverParameters::default());
    }

    #[test]
    fn test_missing_required_field() {
        let mut map = base_map();
        map.remove("table");
        let err = SourceConfig::from_map(&map).unwrap_err();
        assert!(matches!(err, Error::MissingConfigField { ref field } if field == "table"));
    }

    #[test]
    fn test_empty_values_fall_back() {
        let mut map = base_map();
        map.insert("password".to_string(), String::new());
        map.insert("ssl.mode".to_string(), String::new());
        let config = SourceConfig::from_map(&map).unwrap();
        assert_eq!(config.password, None);
        assert_eq!(config.ssl_mode, SslMode::Disable);
    }

    #[test]
    fn test_invalid_port() {
        for port in ["abc", "0", "70000"] {
            let mut map = base_map();
            map.insert("port".to_string(), port.to_string());
            assert!(matches!(
                SourceConfig::from_map(&map),
                Err(Error::InvalidConfigValue { .. })
            ));
        }
    }

    #[test]
    fn test_ssl_modes() {
        assert_eq!("verify-ca".parse::<SslMode>().unwrap(), SslMode::VerifyCa);
        assert_eq!("verify-full".parse::<SslMode>().unwrap(), SslMode::VerifyFull);
        assert!("require".parse::<SslMode>().is_err());
        assert_eq!(SslMode::Trust.to_string(), "trust");
    }

    #[test]
    fn test_format_server_cert() {
        let cert = "-----BEGIN CERTIFICATE----- MIIB abc -----END CERTIFICATE-----";
        assert_eq!(
            format_server_cert(cert),
            "-----BEGIN CERTIFICATE-----\nMIIB\nabc\n-----END CERTIFICATE-----"
        );
    }

    #[test]
    fn test_driver_parameters() {
        let params =
            DriverParameters::parse("connectTimeout=5000; tcpKeepAlive = 1000;waitTimeout=60; compression=true;")
                .unwrap();
        assert_eq!(params.connect_timeout, Some(Duration::from_millis(5000)));
        assert_eq!(params.tcp_keep_alive, Some(1000));
        assert_eq!(params.wait_timeout, Some(60));
        assert!(params.compression);
        assert_eq!(params.stmt_cache_size, None);
    }

    #[test]
    fn test_driver_parameters_malformed() {
        let err = DriverParameters::parse("connectTimeout").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Invalid value of `driverParameters` configuration"
        );
        assert!(DriverParameters::parse("a=b=c").is_err());
    }

    #[test]
    fn test_driver_parameters_unsupported_or_bad_value() {
        assert!(matches!(
            DriverParameters::parse("useSsl=true"),
            Err(Error::InvalidConfigValue { .. })
        ));
        assert!(DriverParameters::parse("connectTimeout=soon").is_err());
    }

    #[test]
    fn test_from_json_stringifies_scalars() {
        let config = SourceConfig::from_json(
            r#"{"host":"h","port":3306,"database":"d","table":"t","user":"u","password":null}"#,
        )
        .unwrap();
        assert_eq!(config.port, 3306);
        assert_eq!(config.password, None);
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.yaml");
        std::fs::write(
            &path,
            "host: h\nport: 3306\ndatabase: d\ntable: t\nuser: u\nssl.mode: trust\n",
        )
        .unwrap();
        let config = SourceConfig::from_file(&path).unwrap();
        assert_eq!(config.ssl_mode, SslMode::Trust);
        assert_eq!(config.table, "t");
    }

    #[test]
    fn test_configuration_form() {
        let form = configuration_form();
        let names: Vec<_> = form.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "host",
                "port",
                "database",
                "table",
                "user",
                "password",
                "ssl.mode",
                "ssl.server.cert",
                "driver.parameters"
            ]
        );
        let cert = &form.fields[7];
        assert_eq!(
            cert.visible_when.as_ref().unwrap().values,
            vec!["trust", "verify-ca", "verify-full"]
        );
        let tests: Vec<_> = form.tests.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tests, vec![TEST_CONNECT, TEST_TABLE]);
    }
}

//! Server configuration
//!
//! Environment variables with defaults, overridden by command-line flags:
//!
//! | variable            | flag            | default        |
//! |---------------------|-----------------|----------------|
//! | `PROOFD_ADDR`       | `--addr <a>`    | `0.0.0.0:9080` |
//! | `PROOFD_ZKEYS`      | positional      | (required)     |
//! | `PROOFD_BLINDING`   | `--no-blinding` | `true`         |
//! | `PROOFD_BODY_LIMIT` | `--body-limit`  | 64 MiB         |
//! | `PROOFD_STRICT_KEYS`| `--strict-keys` | `false`        |
//! | `PROOFD_LOG_FORMAT` | `--log-json`    | `compact`      |
//!
//! `PROOFD_ZKEYS` is comma separated; positional paths replace it.

#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::path::PathBuf;

/// Bad environment or command line.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A value does not parse for its setting.
    #[error("invalid value {value:?} for {name}")]
    Invalid {
        /// Variable or flag name.
        name: &'static str,
        /// Raw value.
        value: String,
    },
    /// A flag that takes a value was last on the line.
    #[error("flag {0} needs a value")]
    MissingValue(String),
    /// Unrecognised `--flag`.
    #[error("unknown flag {0}")]
    UnknownFlag(String),
    /// Neither positional paths nor `PROOFD_ZKEYS`.
    #[error("no proving keys given (pass paths or set PROOFD_ZKEYS)")]
    NoKeys,
}

/// Log line format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable single lines.
    Compact,
    /// One JSON object per event.
    Json,
}

/// Resolved proof server settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listen address.
    pub addr: SocketAddr,
    /// Proving key files; each file stem becomes a circuit id.
    pub zkeys: Vec<PathBuf>,
    /// Randomise proofs with fresh `r`, `s`.
    pub blinding: bool,
    /// Maximum request body in bytes.
    pub body_limit: usize,
    /// Subgroup-check every query table at load.
    pub strict_keys: bool,
    /// Log output format.
    pub log_format: LogFormat,
}

/// Listen address when `PROOFD_ADDR` is unset.
pub const DEFAULT_ADDR: &str = "0.0.0.0:9080";
/// Body limit when `PROOFD_BODY_LIMIT` is unset.
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024 * 1024;

fn parse_bool(name: &'static str, v: &str) -> Result<bool, ConfigError> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: v.to_string(),
        }),
    }
}

fn parse_with<T: std::str::FromStr>(name: &'static str, v: &str) -> Result<T, ConfigError> {
    v.trim().parse().map_err(|_| ConfigError::Invalid {
        name,
        value: v.to_string(),
    })
}

fn parse_log_format(v: &str) -> Result<LogFormat, ConfigError> {
    match v.trim() {
        "json" => Ok(LogFormat::Json),
        "compact" | "text" | "" => Ok(LogFormat::Compact),
        _ => Err(ConfigError::Invalid {
            name: "PROOFD_LOG_FORMAT",
            value: v.to_string(),
        }),
    }
}

impl ServerConfig {
    /// Build from an environment lookup and the arguments after the program
    /// name. Both are injected so tests never touch the process environment.
    pub fn from_env_and_args<I, S>(
        env: impl Fn(&str) -> Option<String>,
        args: I,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cfg = ServerConfig {
            addr: parse_with("PROOFD_ADDR", &env("PROOFD_ADDR").unwrap_or_else(|| DEFAULT_ADDR.into()))?,
            zkeys: env("PROOFD_ZKEYS")
                .map(|s| {
                    s.split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(PathBuf::from)
                        .collect()
                })
                .unwrap_or_default(),
            blinding: env("PROOFD_BLINDING")
                .map(|v| parse_bool("PROOFD_BLINDING", &v))
                .transpose()?
                .unwrap_or(true),
            body_limit: env("PROOFD_BODY_LIMIT")
                .map(|v| parse_with("PROOFD_BODY_LIMIT", &v))
                .transpose()?
                .unwrap_or(DEFAULT_BODY_LIMIT),
            strict_keys: env("PROOFD_STRICT_KEYS")
                .map(|v| parse_bool("PROOFD_STRICT_KEYS", &v))
                .transpose()?
                .unwrap_or(false),
            log_format: env("PROOFD_LOG_FORMAT")
                .map(|v| parse_log_format(&v))
                .transpose()?
                .unwrap_or(LogFormat::Compact),
        };

        let mut positional = Vec::new();
        let mut it = args.into_iter().map(Into::into);
        while let Some(arg) = it.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((f, v)) if f.starts_with("--") => (f.to_string(), Some(v.to_string())),
                _ => (arg.clone(), None),
            };
            let value = |it: &mut dyn Iterator<Item = String>| {
                inline
                    .clone()
                    .or_else(|| it.next())
                    .ok_or_else(|| ConfigError::MissingValue(flag.clone()))
            };
            match flag.as_str() {
                "--addr" => cfg.addr = parse_with("--addr", &value(&mut it)?)?,
                "--body-limit" => cfg.body_limit = parse_with("--body-limit", &value(&mut it)?)?,
                "--no-blinding" => cfg.blinding = false,
                "--strict-keys" => cfg.strict_keys = true,
                "--log-json" => cfg.log_format = LogFormat::Json,
                f if f.starts_with("--") => return Err(ConfigError::UnknownFlag(f.to_string())),
                _ => positional.push(PathBuf::from(arg)),
            }
        }
        if !positional.is_empty() {
            cfg.zkeys = positional;
        }
        if cfg.zkeys.is_empty() {
            return Err(ConfigError::NoKeys);
        }
        Ok(cfg)
    }

    /// Read `std::env` and the process arguments.
    pub fn from_process() -> Result<Self, ConfigError> {
        Self::from_env_and_args(|k| std::env::var(k).ok(), std::env::args().skip(1))
    }
}

/// Install the global `tracing` subscriber. `RUST_LOG` wins over
/// `default_filter`.
pub fn init_tracing(default_filter: &str, format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_with_positional_keys() {
        let cfg = ServerConfig::from_env_and_args(env(&[]), ["a.zkey", "b.zkey"]).unwrap();
        assert_eq!(cfg.addr, DEFAULT_ADDR.parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.zkeys, vec![PathBuf::from("a.zkey"), PathBuf::from("b.zkey")]);
        assert!(cfg.blinding);
        assert!(!cfg.strict_keys);
        assert_eq!(cfg.body_limit, DEFAULT_BODY_LIMIT);
        assert_eq!(cfg.log_format, LogFormat::Compact);
    }

    #[test]
    fn environment_then_flags() {
        let e = env(&[
            ("PROOFD_ADDR", "127.0.0.1:1"),
            ("PROOFD_ZKEYS", "x.zkey, y.zkey,"),
            ("PROOFD_BLINDING", "false"),
            ("PROOFD_LOG_FORMAT", "json"),
        ]);
        let cfg = ServerConfig::from_env_and_args(&e, Vec::<String>::new()).unwrap();
        assert_eq!(cfg.addr, "127.0.0.1:1".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.zkeys.len(), 2);
        assert!(!cfg.blinding);
        assert_eq!(cfg.log_format, LogFormat::Json);

        let cfg = ServerConfig::from_env_and_args(
            &e,
            ["--addr", "127.0.0.1:2", "--body-limit=1024", "--strict-keys", "z.zkey"],
        )
        .unwrap();
        assert_eq!(cfg.addr.port(), 2);
        assert_eq!(cfg.body_limit, 1024);
        assert!(cfg.strict_keys);
        assert_eq!(cfg.zkeys, vec![PathBuf::from("z.zkey")]);
    }

    #[test]
    fn invalid_input_is_reported() {
        assert_eq!(
            ServerConfig::from_env_and_args(env(&[]), Vec::<String>::new()),
            Err(ConfigError::NoKeys)
        );
        assert!(matches!(
            ServerConfig::from_env_and_args(env(&[("PROOFD_BLINDING", "maybe")]), ["k.zkey"]),
            Err(ConfigError::Invalid { name: "PROOFD_BLINDING", .. })
        ));
        assert_eq!(
            ServerConfig::from_env_and_args(env(&[]), ["k.zkey", "--addr"]),
            Err(ConfigError::MissingValue("--addr".into()))
        );
        assert_eq!(
            ServerConfig::from_env_and_args(env(&[]), ["--verbose"]),
            Err(ConfigError::UnknownFlag("--verbose".into()))
        );
    }
}

use std::path::PathBuf;
use std::str::FromStr;

/// Server configuration, read from `SLOTBOOK_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub user: String,
    pub password: String,
    pub max_connections: usize,
    /// WAL appends since the last compaction before the compactor runs.
    pub compact_threshold: u64,
    pub metrics_port: Option<u16>,
    pub tls: Option<TlsPaths>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let tls = match (get("SLOTBOOK_TLS_CERT"), get("SLOTBOOK_TLS_KEY")) {
            (None, None) => None,
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            _ => return Err(ConfigError::TlsIncomplete),
        };

        let max_connections: usize = parse_var(&get, "SLOTBOOK_MAX_CONNECTIONS")?.unwrap_or(256);
        if max_connections == 0 {
            return Err(ConfigError::invalid("SLOTBOOK_MAX_CONNECTIONS", "0", "must be positive"));
        }
        let compact_threshold: u64 = parse_var(&get, "SLOTBOOK_COMPACT_THRESHOLD")?.unwrap_or(1000);
        if compact_threshold == 0 {
            return Err(ConfigError::invalid("SLOTBOOK_COMPACT_THRESHOLD", "0", "must be positive"));
        }

        Ok(Self {
            bind: get("SLOTBOOK_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_var(&get, "SLOTBOOK_PORT")?.unwrap_or(5433),
            data_dir: get("SLOTBOOK_DATA_DIR").unwrap_or_else(|| "./data".into()).into(),
            user: get("SLOTBOOK_USER").unwrap_or_else(|| "slotbook".into()),
            password: get("SLOTBOOK_PASSWORD").unwrap_or_else(|| "slotbook".into()),
            max_connections,
            compact_threshold,
            metrics_port: parse_var(&get, "SLOTBOOK_METRICS_PORT")?,
            tls,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("slotbook.wal")
    }
}

fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::invalid(var, &raw, &e.to_string())),
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    TlsIncomplete,
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str, reason: &str) -> Self {
        ConfigError::Invalid {
            var,
            value: value.to_owned(),
            reason: reason.to_owned(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid { var, value, reason } => write!(f, "invalid {var}={value:?}: {reason}"),
            ConfigError::TlsIncomplete => {
                write!(f, "both SLOTBOOK_TLS_CERT and SLOTBOOK_TLS_KEY must be set, or neither")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

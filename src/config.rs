use std::path::PathBuf;

/// Process configuration, read from the environment at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    /// WAL appends since the last compaction that trigger a new one.
    pub compact_threshold: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 3000,
            data_dir: PathBuf::from("./data"),
            metrics_port: None,
            compact_threshold: 1000,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable numbers fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let port = lookup("SLOTBOOK_PORT")
            .or_else(|| lookup("PORT"))
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);
        Self {
            bind: lookup("SLOTBOOK_BIND").unwrap_or(defaults.bind),
            port,
            data_dir: lookup("SLOTBOOK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            metrics_port: lookup("SLOTBOOK_METRICS_PORT").and_then(|s| s.parse().ok()),
            compact_threshold: lookup("SLOTBOOK_COMPACT_THRESHOLD")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.compact_threshold),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("events.wal")
    }
}

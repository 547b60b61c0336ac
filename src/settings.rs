use serde::Deserialize;
use std::time::Duration;

/// Settings read from `MOVIENIGHT_*` environment variables (and `.env`).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Throw the database away on exit.
    #[serde(default)]
    pub temporary: bool,

    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_spin_delay_ms")]
    pub spin_delay_ms: u64,

    #[serde(default = "default_log")]
    pub log: String,
}

fn default_database_path() -> String {
    "movienight.db".to_owned()
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_owned()
}

fn default_spin_delay_ms() -> u64 {
    2000
}

fn default_log() -> String {
    "movienight=debug,actix_web=info".to_owned()
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("MOVIENIGHT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn spin_delay(&self) -> Duration {
        Duration::from_millis(self.spin_delay_ms)
    }

    pub fn open_db(&self) -> sled::Result<sled::Db> {
        sled::Config::new()
            .path(&self.database_path)
            .temporary(self.temporary)
            .open()
    }

    #[cfg(test)]
    pub fn with_overrides(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        builder.build()?.try_deserialize()
    }
}

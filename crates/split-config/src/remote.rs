use serde::Deserialize;

/// Connection settings for the remote (Redis-backed) storage backend. Only
/// consulted when `operation_mode = "remote"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub password: String,
    /// Prepended to every key. Empty omits the leading `.` the layout
    /// otherwise shows.
    pub prefix: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            password: String::new(),
            prefix: String::new(),
        }
    }
}

impl RemoteConfig {
    /// `redis://[:password@]host:port/db` connection string.
    pub fn connection_url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                self.password, self.host, self.port, self.db
            )
        }
    }

    /// Key prefix with the trailing `.` the layout expects, or empty.
    pub fn key_prefix(&self) -> String {
        if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}.", self.prefix)
        }
    }
}

/// Advanced transport overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdvancedConfig {
    pub sdk_url: String,
    pub events_url: String,
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            sdk_url: "https://sdk.split.io/api".to_string(),
            events_url: "https://events.split.io/api".to_string(),
        }
    }
}

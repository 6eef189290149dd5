use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use gopher_client_core::TransactOptions;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
pub struct ClientConfig {
    /// Target browsed when none is given on the command line.
    pub home: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub json: bool,
}

impl ClientConfig {
    pub fn load() -> Self {
        for path in Self::candidate_paths() {
            if let Ok(content) = std::fs::read_to_string(&path) {
                match toml::from_str::<ClientConfig>(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to parse config");
                    }
                }
            }
        }
        Self::default()
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let home = match std::env::var("HOME") {
            Ok(h) => PathBuf::from(h),
            Err(_) => return Vec::new(),
        };

        vec![home.join(".gopher-client.toml")]
    }

    /// Deadlines from the file, overridden by any given on the command line.
    /// A value of zero disables the corresponding deadline.
    pub fn transact_options(&self, connect_timeout: Option<u64>, timeout: Option<u64>) -> TransactOptions {
        let connect = connect_timeout
            .or(self.connect_timeout_secs)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);
        let total = timeout.or(self.timeout_secs).unwrap_or(DEFAULT_TIMEOUT_SECS);
        TransactOptions {
            connect_timeout: seconds(connect),
            timeout: seconds(total),
        }
    }
}

fn seconds(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_file() {
        let config: ClientConfig = toml::from_str(
            r#"
            home = "gopher://gopher.floodgap.com/1/"
            connect_timeout_secs = 3
            timeout_secs = 0
            json = true
            "#,
        )
        .unwrap();
        assert_eq!(config.home.as_deref(), Some("gopher://gopher.floodgap.com/1/"));
        assert_eq!(config.connect_timeout_secs, Some(3));
        assert_eq!(config.timeout_secs, Some(0));
        assert!(config.json);
    }

    #[test]
    fn empty_file_is_default() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn flags_override_file() {
        let config = ClientConfig {
            connect_timeout_secs: Some(3),
            timeout_secs: Some(60),
            ..Default::default()
        };
        let options = config.transact_options(None, Some(5));
        assert_eq!(options.connect_timeout, Some(Duration::from_secs(3)));
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn zero_disables_deadline() {
        let options = ClientConfig::default().transact_options(Some(0), None);
        assert_eq!(options.connect_timeout, None);
        assert_eq!(options.timeout, Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)));
    }
}

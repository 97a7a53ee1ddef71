use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Real-time channel configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    /// Origin of the hosting page, e.g. "https://dashboard.example.org".
    /// The stream endpoint is derived from it with protocol parity.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Well-known path of the stream endpoint
    #[serde(default = "default_stream_path")]
    pub stream_path: String,

    /// Delay between reconnection attempts (milliseconds).
    ///
    /// Constant by contract: every retry waits the same interval, with
    /// no backoff growth and no retry cap.
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

fn default_origin() -> String {
    "http://localhost:5000".to_string()
}

fn default_stream_path() -> String {
    "/ws".to_string()
}

fn default_retry_interval_ms() -> u64 {
    5000
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            stream_path: default_stream_path(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

impl ChannelConfig {
    /// Stream endpoint derived from the page origin.
    ///
    /// Protocol parity with the hosting page: an `https` origin yields
    /// an encrypted `wss` endpoint, plain `http` yields `ws`.
    pub fn endpoint(&self) -> Result<Url> {
        let origin: Url = self
            .origin
            .parse()
            .with_context(|| format!("invalid origin '{}'", self.origin))?;

        let scheme = match origin.scheme() {
            "http" => "ws",
            "https" => "wss",
            other => bail!("origin scheme must be http or https, got '{}'", other),
        };

        let mut endpoint = origin;
        endpoint
            .set_scheme(scheme)
            .ok()
            .context("failed to set websocket scheme")?;
        endpoint.set_path(&self.stream_path);
        Ok(endpoint)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

/// Load configuration from TOML file
pub fn load_config(path: &str) -> Result<ChannelConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path))?;
    let config: ChannelConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file '{}'", path))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ChannelConfig::default();
        assert_eq!(config.origin, "http://localhost:5000");
        assert_eq!(config.stream_path, "/ws");
        assert_eq!(config.retry_interval_ms, 5000);
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            origin = "https://traffic.example.org"
            stream_path = "/live"
            retry_interval_ms = 2000
        "#;

        let config: ChannelConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.origin, "https://traffic.example.org");
        assert_eq!(config.stream_path, "/live");
        assert_eq!(config.retry_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_config() {
        // Missing fields use defaults
        let toml = r#"
            origin = "https://traffic.example.org"
        "#;

        let config: ChannelConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.origin, "https://traffic.example.org");
        assert_eq!(config.stream_path, "/ws"); // Default
        assert_eq!(config.retry_interval_ms, 5000); // Default
    }

    #[test]
    fn test_endpoint_protocol_parity() {
        let mut config = ChannelConfig::default();

        config.origin = "http://localhost:5000".to_string();
        assert_eq!(config.endpoint().unwrap().as_str(), "ws://localhost:5000/ws");

        config.origin = "https://traffic.example.org".to_string();
        assert_eq!(
            config.endpoint().unwrap().as_str(),
            "wss://traffic.example.org/ws"
        );
    }

    #[test]
    fn test_endpoint_rejects_non_http_origin() {
        let config = ChannelConfig {
            origin: "ftp://example.org".to_string(),
            ..Default::default()
        };
        assert!(config.endpoint().is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "origin = \"https://traffic.example.org\"").unwrap();
        writeln!(file, "retry_interval_ms = 1000").unwrap();

        let config = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.origin, "https://traffic.example.org");
        assert_eq!(config.retry_interval_ms, 1000);
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config("/nonexistent/trafficlive.toml").is_err());
    }
}

// Configuration module entry point
// Loads layered configuration and holds the shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{Config, HttpConfig};

/// Config file used when none is given on the command line
pub const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// Sources, lowest priority first: built-in defaults, the optional file,
    /// then `ICON_`-prefixed environment variables (`ICON_SERVER__PORT=8080`).
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("ICON")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 4050)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "icon-gateway")?
            .set_default("http.enable_cors", false)?
            .set_default("http.liveness_text", "Self-hosted icon server")?
            .set_default("upstream.cdn_root", "https://cdn.jsdelivr.net/gh/selfhst/icons")?
            .set_default("upstream.user_agent", "SelfHostedIconServer/1.0")?
            .build()?;

        settings.try_deserialize()
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests touching ICON_* variables must not overlap
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults_without_file() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let cfg = Config::load_from("does-not-exist/icon-gateway").unwrap();
        assert_eq!(cfg.server.port, 4050);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.upstream.cdn_root, "https://cdn.jsdelivr.net/gh/selfhst/icons");
        assert_eq!(cfg.upstream.user_agent, "SelfHostedIconServer/1.0");
        assert_eq!(cfg.logging.access_log_format, "combined");
        assert_eq!(cfg.http.liveness_text, "Self-hosted icon server");
        assert!(cfg.logging.access_log_file.is_none());
        assert!(cfg.performance.max_connections.is_none());
    }

    #[test]
    fn test_socket_addr() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut cfg = Config::load_from("does-not-exist/icon-gateway").unwrap();
        assert_eq!(cfg.get_socket_addr().unwrap().port(), cfg.server.port);
        cfg.server.host = "not an ip".to_string();
        assert!(cfg.get_socket_addr().is_err());
    }

    #[test]
    fn test_environment_overrides() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        std::env::set_var("ICON_SERVER__PORT", "8081");
        std::env::set_var("ICON_HTTP__SERVER_NAME", "icons.local");
        let cfg = Config::load_from("does-not-exist/icon-gateway");
        std::env::remove_var("ICON_SERVER__PORT");
        std::env::remove_var("ICON_HTTP__SERVER_NAME");

        let cfg = cfg.unwrap();
        assert_eq!(cfg.server.port, 8081);
        assert_eq!(cfg.http.server_name, "icons.local");
    }
}

use std::env;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_base_url: String,
    pub api_key: String,
    pub jwt_secret: String,
    pub access_token: String,
    pub realtime_url: String,
    pub realtime_connect_timeout_secs: u64,
    pub realtime_ack_timeout_secs: u64,
    pub realtime_reconnect_base_ms: u64,
    pub realtime_reconnect_max_ms: u64,
    pub offer_window_secs: i64,
    pub offer_tick_ms: u64,
    pub media_join_timeout_secs: u64,
    pub bind_addr: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            api_key: String::new(),
            jwt_secret: String::new(),
            access_token: String::new(),
            realtime_url: String::new(),
            realtime_connect_timeout_secs: 10,
            realtime_ack_timeout_secs: 10,
            realtime_reconnect_base_ms: 500,
            realtime_reconnect_max_ms: 30_000,
            offer_window_secs: 60,
            offer_tick_ms: 1000,
            media_join_timeout_secs: 30,
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let config = Self {
            api_base_url: env::var("PORTAL_API_URL")
                .unwrap_or_else(|_| {
                    warn!("PORTAL_API_URL not set, using empty value");
                    String::new()
                }),
            api_key: env::var("PORTAL_API_KEY")
                .unwrap_or_else(|_| {
                    warn!("PORTAL_API_KEY not set, using empty value");
                    String::new()
                }),
            jwt_secret: env::var("PORTAL_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("PORTAL_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            access_token: env::var("PORTAL_ACCESS_TOKEN")
                .unwrap_or_else(|_| {
                    warn!("PORTAL_ACCESS_TOKEN not set, using empty value");
                    String::new()
                }),
            realtime_url: env::var("REALTIME_URL")
                .unwrap_or_else(|_| {
                    warn!("REALTIME_URL not set, using empty value");
                    String::new()
                }),
            realtime_connect_timeout_secs: parse_or("REALTIME_CONNECT_TIMEOUT_SECS", defaults.realtime_connect_timeout_secs),
            realtime_ack_timeout_secs: parse_or("REALTIME_ACK_TIMEOUT_SECS", defaults.realtime_ack_timeout_secs),
            realtime_reconnect_base_ms: parse_or("REALTIME_RECONNECT_BASE_MS", defaults.realtime_reconnect_base_ms),
            realtime_reconnect_max_ms: parse_or("REALTIME_RECONNECT_MAX_MS", defaults.realtime_reconnect_max_ms),
            offer_window_secs: parse_or("OFFER_WINDOW_SECS", defaults.offer_window_secs),
            offer_tick_ms: parse_or("OFFER_TICK_MS", defaults.offer_tick_ms),
            media_join_timeout_secs: parse_or("MEDIA_JOIN_TIMEOUT_SECS", defaults.media_join_timeout_secs),
            bind_addr: env::var("PORTAL_BIND_ADDR").unwrap_or(defaults.bind_addr),
        };

        if !config.is_configured() {
            warn!("Portal not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        self.is_rest_configured()
            && self.is_realtime_configured()
            && !self.jwt_secret.is_empty()
    }

    pub fn is_rest_configured(&self) -> bool {
        !self.api_base_url.is_empty()
    }

    pub fn is_realtime_configured(&self) -> bool {
        !self.realtime_url.is_empty() && !self.access_token.is_empty()
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value ({}), using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_offer_window() {
        let config = AppConfig::default();
        assert_eq!(config.offer_window_secs, 60);
        assert_eq!(config.offer_tick_ms, 1000);
        assert!(!config.is_configured());
    }

    #[test]
    fn realtime_requires_url_and_token() {
        let mut config = AppConfig::default();
        config.realtime_url = "ws://localhost:4000/ws".to_string();
        assert!(!config.is_realtime_configured());
        config.access_token = "token".to_string();
        assert!(config.is_realtime_configured());
    }
}

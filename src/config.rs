use std::net::SocketAddr;
use std::str::FromStr;

use url::Url;

const DEFAULT_DATABASE_URL: &str = "sqlite:data/pokerboard.db";
const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_TOKEN_EXPIRY_MINUTES: i64 = 120;
const MAX_TOKEN_EXPIRY_MINUTES: i64 = 60 * 24 * 365;
const DEFAULT_MAIL_QUEUE_CAPACITY: usize = 64;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_MAIL_FROM: &str = "Pokerboard <noreply@localhost>";

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

/// Runtime settings, read from the environment after `.env` is loaded.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub base_url: Url,
    pub token_expiry_minutes: i64,
    pub secure_cookies: bool,
    pub mail_queue_capacity: usize,
    pub smtp: Option<SmtpConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let smtp = lookup("SMTP_HOST")
            .filter(|h| !h.trim().is_empty())
            .map(|host| SmtpConfig {
                host,
                port: parse_or(&lookup, "SMTP_PORT", DEFAULT_SMTP_PORT),
                username: lookup("SMTP_USERNAME").unwrap_or_default(),
                password: lookup("SMTP_PASSWORD").unwrap_or_default(),
                from: lookup("MAIL_FROM").unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string()),
            });

        let token_expiry_minutes = match parse_or(&lookup, "TOKEN_EXPIRY_MINUTES", DEFAULT_TOKEN_EXPIRY_MINUTES) {
            m if m > MAX_TOKEN_EXPIRY_MINUTES => {
                tracing::warn!("TOKEN_EXPIRY_MINUTES capped at {MAX_TOKEN_EXPIRY_MINUTES}, got {m}");
                MAX_TOKEN_EXPIRY_MINUTES
            }
            m if m > 0 => m,
            m => {
                tracing::warn!("TOKEN_EXPIRY_MINUTES must be positive, got {m}; using default");
                DEFAULT_TOKEN_EXPIRY_MINUTES
            }
        };

        Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            bind_addr: parse_or(&lookup, "BIND_ADDR", default_bind_addr()),
            base_url: parse_or(&lookup, "BASE_URL", default_base_url()),
            token_expiry_minutes,
            secure_cookies: parse_or(&lookup, "SECURE_COOKIES", false),
            mail_queue_capacity: parse_or(&lookup, "MAIL_QUEUE_CAPACITY", DEFAULT_MAIL_QUEUE_CAPACITY).max(1),
            smtp,
        }
    }

    pub fn token_expiry(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.token_expiry_minutes)
    }

    /// Link embedded in verification and invitation emails.
    pub fn signup_link(&self, token: &str) -> String {
        let mut url = self.base_url.clone();
        url.set_path("/signup");
        url.query_pairs_mut().clear().append_pair("token", token);
        url.to_string()
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value for {key}: {raw:?}; using default");
            default
        }),
        None => default,
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = Config::default();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:3000");
        assert_eq!(config.token_expiry_minutes, 120);
        assert!(!config.secure_cookies);
        assert!(config.smtp.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("TOKEN_EXPIRY_MINUTES", "30"),
            ("SECURE_COOKIES", "true"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "2525"),
        ]);
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.token_expiry(), chrono::Duration::minutes(30));
        assert!(config.secure_cookies);
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.host, "smtp.example.com");
        assert_eq!(smtp.port, 2525);
        assert_eq!(smtp.from, DEFAULT_MAIL_FROM);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("TOKEN_EXPIRY_MINUTES", "-5"),
            ("BIND_ADDR", "not an address"),
            ("MAIL_QUEUE_CAPACITY", "0"),
        ]);
        assert_eq!(config.token_expiry_minutes, DEFAULT_TOKEN_EXPIRY_MINUTES);
        assert_eq!(config.bind_addr, default_bind_addr());
        assert_eq!(config.mail_queue_capacity, 1);
    }

    #[test]
    fn oversized_token_expiry_is_capped() {
        let config = config_from(&[("TOKEN_EXPIRY_MINUTES", "100000000000000")]);
        assert_eq!(config.token_expiry_minutes, MAX_TOKEN_EXPIRY_MINUTES);
        assert_eq!(config.token_expiry(), chrono::Duration::days(365));

        let config = config_from(&[("TOKEN_EXPIRY_MINUTES", "525600")]);
        assert_eq!(config.token_expiry_minutes, 525_600);
    }

    #[test]
    fn signup_link_carries_token() {
        let config = config_from(&[("BASE_URL", "https://poker.example.com/app")]);
        assert_eq!(
            config.signup_link("abc123"),
            "https://poker.example.com/signup?token=abc123"
        );
    }
}

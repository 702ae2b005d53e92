use thiserror::Error;

#[derive(Debug, Clone)]
pub struct UrlSignerConfig {
    pub secret: String,
    pub default_ttl: Option<u64>, // seconds
    pub port: u16,
}

impl Default for UrlSignerConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            default_ttl: Some(3600),
            port: 8080,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Secret cannot be empty")] EmptySecret,
    #[error("Default TTL must be > 0")] InvalidTtl,
    #[error("Invalid value for {0}: {1}")] InvalidVar(&'static str, String),
}

impl UrlSignerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.trim().is_empty() { return Err(ConfigError::EmptySecret); }
        if self.default_ttl == Some(0) { return Err(ConfigError::InvalidTtl); }
        Ok(())
    }

    /// Read `URLSIGNER_SECRET`, `URLSIGNER_DEFAULT_TTL` and `PORT`.
    ///
    /// Unset variables keep their defaults; the result still needs `validate`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Ok(secret) = std::env::var("URLSIGNER_SECRET") {
            cfg.secret = secret;
        }
        if let Ok(ttl) = std::env::var("URLSIGNER_DEFAULT_TTL") {
            cfg.default_ttl = match ttl.as_str() {
                "" | "none" => None,
                s => Some(s.parse().map_err(|_| ConfigError::InvalidVar("URLSIGNER_DEFAULT_TTL", ttl.clone()))?),
            };
        }
        if let Ok(port) = std::env::var("PORT") {
            cfg.port = port.parse().map_err(|_| ConfigError::InvalidVar("PORT", port.clone()))?;
        }
        Ok(cfg)
    }
}

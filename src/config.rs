use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Upper bound for either token lifetime.
pub const MAX_TOKEN_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub cookies: CookieConfig,
    pub media: MediaConfig,
    pub server: ServerConfig,
    pub tokens: TokenConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Allowed origin for credentialed CORS requests
    pub cors_origin: Option<String>,
    pub data_dir: String,
    /// Body limit applied to multipart upload routes
    pub max_upload_bytes: usize,
}

#[derive(Clone)]
pub struct TokenConfig {
    pub access_secret: String,
    pub access_ttl_seconds: u64,
    pub refresh_secret: String,
    pub refresh_ttl_seconds: u64,
}

// Secrets stay out of logs.
impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("access_secret", &"<redacted>")
            .field("access_ttl_seconds", &self.access_ttl_seconds)
            .field("refresh_secret", &"<redacted>")
            .field("refresh_ttl_seconds", &self.refresh_ttl_seconds)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub secure: bool,
}

#[derive(Clone, Default)]
pub struct MediaConfig {
    pub cloudinary: Option<CloudinaryConfig>,
}

impl fmt::Debug for MediaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backend = match &self.cloudinary {
            Some(c) => format!("cloudinary({})", c.cloud_name),
            None => "memory".to_string(),
        };
        f.debug_struct("MediaConfig").field("backend", &backend).finish()
    }
}

#[derive(Clone)]
pub struct CloudinaryConfig {
    pub api_key: String,
    pub api_secret: String,
    pub cloud_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            cors_origin: None,
            data_dir: "./data".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self { secure: true }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = ServerConfig::default();

        let bind_address = std::env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address);
        let data_dir = std::env::var("DATA_DIR").unwrap_or(defaults.data_dir);
        let cors_origin = std::env::var("CORS_ORIGIN")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let max_upload_bytes = match std::env::var("MAX_UPLOAD_BYTES") {
            Ok(v) => v.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("MAX_UPLOAD_BYTES is not a number: {v}"))
            })?,
            Err(_) => defaults.max_upload_bytes,
        };

        let access_secret = std::env::var("ACCESS_TOKEN_SECRET").unwrap_or_default();
        let refresh_secret = std::env::var("REFRESH_TOKEN_SECRET").unwrap_or_default();
        let access_ttl_seconds = parse_expiry_var("ACCESS_TOKEN_EXPIRY", "1d")?;
        let refresh_ttl_seconds = parse_expiry_var("REFRESH_TOKEN_EXPIRY", "10d")?;

        let secure = std::env::var("COOKIE_SECURE")
            .map(|v| !matches!(v.to_lowercase().as_str(), "false" | "0" | "no"))
            .unwrap_or(true);

        let cloudinary = match (
            std::env::var("CLOUDINARY_CLOUD_NAME"),
            std::env::var("CLOUDINARY_API_KEY"),
            std::env::var("CLOUDINARY_API_SECRET"),
        ) {
            (Ok(cloud_name), Ok(api_key), Ok(api_secret))
                if !cloud_name.is_empty() && !api_key.is_empty() && !api_secret.is_empty() =>
            {
                Some(CloudinaryConfig {
                    api_key,
                    api_secret,
                    cloud_name,
                })
            }
            _ => None,
        };

        let config = Config {
            cookies: CookieConfig { secure },
            media: MediaConfig { cloudinary },
            server: ServerConfig {
                bind_address,
                cors_origin,
                data_dir,
                max_upload_bytes,
            },
            tokens: TokenConfig {
                access_secret,
                access_ttl_seconds,
                refresh_secret,
                refresh_ttl_seconds,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens.access_secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "ACCESS_TOKEN_SECRET is required".to_string(),
            ));
        }
        if self.tokens.refresh_secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "REFRESH_TOKEN_SECRET is required".to_string(),
            ));
        }
        if self.tokens.access_secret == self.tokens.refresh_secret {
            return Err(ConfigError::ValidationError(
                "ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ".to_string(),
            ));
        }
        for (name, ttl) in [
            ("ACCESS_TOKEN_EXPIRY", self.tokens.access_ttl_seconds),
            ("REFRESH_TOKEN_EXPIRY", self.tokens.refresh_ttl_seconds),
        ] {
            if ttl == 0 || ttl > MAX_TOKEN_TTL_SECONDS {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 1 second and 365 days (got {ttl}s)"
                )));
            }
        }
        if self.tokens.access_ttl_seconds >= self.tokens.refresh_ttl_seconds {
            tracing::warn!(
                access_ttl = self.tokens.access_ttl_seconds,
                refresh_ttl = self.tokens.refresh_ttl_seconds,
                "Access tokens outlive refresh tokens; refresh flow will rarely be used"
            );
        }
        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_BYTES must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

}

fn parse_expiry_var(name: &str, default: &str) -> Result<u64, ConfigError> {
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    match parse_duration_seconds(&raw) {
        Some(0) | None => Err(ConfigError::ValidationError(format!(
            "{name} must be a positive duration like 900, 15m, 12h or 10d (got {raw:?})"
        ))),
        Some(secs) => Ok(secs),
    }
}

/// Parse `"<n>"`, `"<n>s"`, `"<n>m"`, `"<n>h"` or `"<n>d"` into seconds.
pub fn parse_duration_seconds(value: &str) -> Option<u64> {
    let value = value.trim();
    let (digits, multiplier) = match value.chars().last()? {
        's' => (&value[..value.len() - 1], 1),
        'm' => (&value[..value.len() - 1], 60),
        'h' => (&value[..value.len() - 1], 60 * 60),
        'd' => (&value[..value.len() - 1], 24 * 60 * 60),
        c if c.is_ascii_digit() => (value, 1),
        _ => return None,
    };
    digits.trim().parse::<u64>().ok()?.checked_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_seconds() {
        assert_eq!(parse_duration_seconds("900"), Some(900));
        assert_eq!(parse_duration_seconds("30s"), Some(30));
        assert_eq!(parse_duration_seconds("15m"), Some(900));
        assert_eq!(parse_duration_seconds("12h"), Some(43_200));
        assert_eq!(parse_duration_seconds("10d"), Some(864_000));
        assert_eq!(parse_duration_seconds(""), None);
        assert_eq!(parse_duration_seconds("d"), None);
        assert_eq!(parse_duration_seconds("1w"), None);
        assert_eq!(parse_duration_seconds("-5m"), None);
    }

    #[test]
    fn test_validate_rejects_shared_secret() {
        let mut config = crate::testutil::test_config();
        config.tokens.refresh_secret = config.tokens.access_secret.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_missing_secret() {
        let mut config = crate::testutil::test_config();
        config.tokens.access_secret.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_expiry() {
        let mut config = crate::testutil::test_config();
        config.tokens.access_ttl_seconds = parse_duration_seconds("9223372036854775807").unwrap();
        assert!(config.validate().is_err());

        let mut config = crate::testutil::test_config();
        config.tokens.refresh_ttl_seconds = parse_duration_seconds("18446744073709551615").unwrap();
        assert!(config.validate().is_err());

        let mut config = crate::testutil::test_config();
        config.tokens.refresh_ttl_seconds = parse_duration_seconds("366d").unwrap();
        assert!(config.validate().is_err());

        let mut config = crate::testutil::test_config();
        config.tokens.refresh_ttl_seconds = parse_duration_seconds("365d").unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_token_config_debug_redacts_secrets() {
        let config = crate::testutil::test_config();
        let rendered = format!("{:?}", config.tokens);
        assert!(!rendered.contains(&config.tokens.access_secret));
        assert!(rendered.contains("<redacted>"));
    }
}

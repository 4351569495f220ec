use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_database_url")]
    pub database_url: String,

    pub jwt_secret: String,

    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,

    /// Where the login page sends users when no `next` target was given.
    #[serde(default = "default_login_redirect_url")]
    pub login_redirect_url: String,

    #[serde(default = "default_media_dir")]
    pub media_dir: String,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Marks the session cookie `Secure`. Enable when served over HTTPS.
    #[serde(default)]
    pub secure_cookies: bool,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    bind_address: Option<String>,
    database_url: Option<String>,
    jwt_secret: Option<String>,
    token_ttl_hours: Option<i64>,
    login_redirect_url: Option<String>,
    media_dir: Option<String>,
    log_dir: Option<String>,
    max_upload_bytes: Option<usize>,
    secure_cookies: Option<bool>,
}

fn default_bind_address() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_database_url() -> String {
    "sqlite://recipes.db?mode=rwc".to_string()
}

/// One year.
const MAX_TOKEN_TTL_HOURS: i64 = 24 * 366;

fn default_token_ttl_hours() -> i64 {
    24
}

fn default_login_redirect_url() -> String {
    "/".to_string()
}

fn default_media_dir() -> String {
    "media".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl ServerConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config = match config_path {
            Some(path_str) => Self::read_file(Path::new(path_str))?,
            None => PartialServerConfig::default(),
        };

        // 2. Load from environment variables
        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()
            .map_err(|e| format!("Failed to load config from environment: {e}"))?;

        // 3. Merge: environment overrides file
        Self::merge(env_config, file_config)
    }

    fn read_file(path: &Path) -> Result<PartialServerConfig, String> {
        if !path.exists() {
            return Ok(PartialServerConfig::default());
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?;
        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse TOML from config file at {path:?}: {e}"))
    }

    fn merge(env_config: PartialServerConfig, file_config: PartialServerConfig) -> Result<Self, String> {
        let token_ttl_hours = env_config.token_ttl_hours.or(file_config.token_ttl_hours)
            .unwrap_or_else(default_token_ttl_hours);
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&token_ttl_hours) {
            return Err(format!("TOKEN_TTL_HOURS must be between 1 and {MAX_TOKEN_TTL_HOURS}"));
        }

        Ok(ServerConfig {
            bind_address: env_config.bind_address.or(file_config.bind_address)
                .unwrap_or_else(default_bind_address),
            database_url: env_config.database_url.or(file_config.database_url)
                .unwrap_or_else(default_database_url),
            jwt_secret: env_config.jwt_secret.or(file_config.jwt_secret)
                .filter(|secret| !secret.is_empty())
                .ok_or("JWT_SECRET is required")?,
            token_ttl_hours,
            login_redirect_url: env_config.login_redirect_url.or(file_config.login_redirect_url)
                .unwrap_or_else(default_login_redirect_url),
            media_dir: env_config.media_dir.or(file_config.media_dir)
                .unwrap_or_else(default_media_dir),
            log_dir: env_config.log_dir.or(file_config.log_dir)
                .unwrap_or_else(default_log_dir),
            max_upload_bytes: env_config.max_upload_bytes.or(file_config.max_upload_bytes)
                .unwrap_or_else(default_max_upload_bytes),
            secure_cookies: env_config.secure_cookies.or(file_config.secure_cookies)
                .unwrap_or_default(),
        })
    }

    /// Config with every default filled in, for embedding the router in tests or tools.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        ServerConfig {
            bind_address: default_bind_address(),
            database_url: default_database_url(),
            jwt_secret: jwt_secret.into(),
            token_ttl_hours: default_token_ttl_hours(),
            login_redirect_url: default_login_redirect_url(),
            media_dir: default_media_dir(),
            log_dir: default_log_dir(),
            max_upload_bytes: default_max_upload_bytes(),
            secure_cookies: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_values_override_file_values() {
        let file: PartialServerConfig = toml::from_str(
            r#"
            jwt_secret = "from-file"
            media_dir = "/srv/media"
            token_ttl_hours = 6
            "#,
        )
        .unwrap();
        let env = PartialServerConfig {
            jwt_secret: Some("from-env".to_string()),
            ..Default::default()
        };

        let config = ServerConfig::merge(env, file).unwrap();
        assert_eq!(config.jwt_secret, "from-env");
        assert_eq!(config.media_dir, "/srv/media");
        assert_eq!(config.token_ttl_hours, 6);
        assert_eq!(config.login_redirect_url, "/");
        assert_eq!(config.bind_address, "0.0.0.0:8000");
        assert!(!config.secure_cookies);
    }

    #[test]
    fn missing_secret_is_rejected() {
        let result = ServerConfig::merge(PartialServerConfig::default(), PartialServerConfig::default());
        assert_eq!(result.unwrap_err(), "JWT_SECRET is required");

        let empty = PartialServerConfig {
            jwt_secret: Some(String::new()),
            ..Default::default()
        };
        assert!(ServerConfig::merge(empty, PartialServerConfig::default()).is_err());
    }

    #[test]
    fn token_lifetime_must_be_in_range() {
        for hours in [0, -5, i64::MAX] {
            let env = PartialServerConfig {
                jwt_secret: Some("secret".to_string()),
                token_ttl_hours: Some(hours),
                ..Default::default()
            };
            assert!(ServerConfig::merge(env, PartialServerConfig::default()).is_err(), "{hours}");
        }
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let partial = ServerConfig::read_file(Path::new("/definitely/not/here.toml")).unwrap();
        assert!(partial.jwt_secret.is_none());
        assert!(partial.media_dir.is_none());
    }
}

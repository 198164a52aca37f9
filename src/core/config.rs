use std::{env, fs};

use anyhow::{Result, anyhow};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "test" => Environment::Test,
            _ => Environment::Development,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage_path: String,
    pub db_path: String,
    pub app_url: String,
    pub environment: Environment,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_auth_url: String,
    pub google_token_url: String,
    pub google_api_url: String,
    // Public calendar fallback, only used when explicitly enabled
    pub google_api_key: Option<String>,
    pub google_calendar_id: Option<String>,
    pub enable_api_key_fallback: bool,
    pub composio_api_key: Option<String>,
    pub composio_auth_config_id: Option<String>,
    pub composio_api_url: String,
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required_var(name: &str) -> Result<String> {
    optional_var(name).ok_or_else(|| anyhow!("Missing env var {}", name))
}

impl AppConfig {
    /// Read the configuration from the process environment. Values in a
    /// `.env` file in the working directory are loaded first.
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine, the environment may be set directly
        let _ = dotenvy::dotenv();

        let storage_path = env::var("KATALYST_STORAGE_PATH").unwrap_or("./".to_string());
        let db_path = format!("{}/katalyst.db", storage_path.trim_end_matches('/'));
        let app_url = env::var("KATALYST_APP_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();
        let environment = Environment::parse(
            &env::var("KATALYST_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let google_client_id = required_var("GOOGLE_CLIENT_ID")?;
        let google_client_secret = required_var("GOOGLE_CLIENT_SECRET")?;
        let google_auth_url = env::var("GOOGLE_AUTH_URL")
            .unwrap_or_else(|_| "https://accounts.google.com/o/oauth2/v2/auth".to_string());
        let google_token_url = env::var("GOOGLE_TOKEN_URL")
            .unwrap_or_else(|_| "https://oauth2.googleapis.com/token".to_string());
        let google_api_url = env::var("GOOGLE_API_URL")
            .unwrap_or_else(|_| "https://www.googleapis.com".to_string());
        let enable_api_key_fallback = optional_var("ENABLE_API_KEY_FALLBACK")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let composio_api_url = env::var("COMPOSIO_API_URL")
            .unwrap_or_else(|_| "https://backend.composio.dev".to_string());

        Ok(Self {
            storage_path,
            db_path,
            app_url,
            environment,
            google_client_id,
            google_client_secret,
            google_auth_url,
            google_token_url,
            google_api_url: google_api_url.trim_end_matches('/').to_string(),
            google_api_key: optional_var("GOOGLE_API_KEY"),
            google_calendar_id: optional_var("GOOGLE_CALENDAR_ID"),
            enable_api_key_fallback,
            composio_api_key: optional_var("COMPOSIO_API_KEY"),
            composio_auth_config_id: optional_var("COMPOSIO_AUTH_CONFIG_ID"),
            composio_api_url: composio_api_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    /// Create the storage directory the db lives in if it doesn't exist
    pub fn ensure_storage_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.storage_path)
            .map_err(|e| anyhow!("Failed to create storage directory {}: {}", self.storage_path, e))
    }

    /// The redirect URI registered with Google for the sign in callback
    pub fn oauth_redirect_uri(&self) -> String {
        format!("{}/api/auth/callback/google", self.app_url)
    }
}

/// Config with every Google and connector endpoint pointed at `server_url`
#[cfg(test)]
pub(crate) fn test_config(server_url: &str) -> AppConfig {
    AppConfig {
        storage_path: String::from("./"),
        db_path: String::from(":memory:"),
        app_url: String::from("http://localhost:3000"),
        environment: Environment::Test,
        google_client_id: String::from("test_client_id"),
        google_client_secret: String::from("test_client_secret"),
        google_auth_url: format!("{}/o/oauth2/v2/auth", server_url),
        google_token_url: format!("{}/token", server_url),
        google_api_url: server_url.to_string(),
        google_api_key: None,
        google_calendar_id: None,
        enable_api_key_fallback: false,
        composio_api_key: None,
        composio_auth_config_id: None,
        composio_api_url: server_url.to_string(),
    }
}

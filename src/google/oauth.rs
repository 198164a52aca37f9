//! Google OAuth 2.0 web server flow: consent URL, code exchange, token
//! refresh and the userinfo profile.

use std::fmt;

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::AppConfig;
use crate::core::retry::{RetryPolicy, with_retry};

pub const SCOPES: &str = "openid email profile https://www.googleapis.com/auth/calendar.readonly";

/// Scopes a production sign in must have granted
pub const REQUIRED_SCOPES: [&str; 4] = ["openid", "email", "profile", "calendar.readonly"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub token_type: Option<String>,
    pub id_token: Option<String>,
}

/// Error body returned by the token endpoint, e.g. `invalid_grant`
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthError {
    pub error: String,
    pub error_description: Option<String>,
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for OAuthError {}

#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub sub: String,
    pub email: Option<String>,
    pub email_verified: Option<bool>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

/// URL of the Google consent screen. Offline access and a forced consent
/// prompt make sure a refresh token is issued every time.
pub fn authorization_url(config: &AppConfig, state: &str) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}",
        config.google_auth_url,
        urlencoding::encode(&config.google_client_id),
        urlencoding::encode(&config.oauth_redirect_uri()),
        urlencoding::encode(SCOPES),
        urlencoding::encode(state),
    )
}

/// True when every required scope appears in the space separated
/// `granted` list.
pub fn has_required_scopes(granted: &str) -> bool {
    REQUIRED_SCOPES.iter().all(|scope| granted.contains(scope))
}

async fn token_request(
    http: &Client,
    url: &str,
    params: &[(&str, &str)],
    retry: &RetryPolicy,
) -> Result<OAuthToken> {
    let res = with_retry(retry, || http.post(url).form(params).send()).await?;
    let status = res.status();
    let body = res.text().await?;

    if !status.is_success() {
        if let Ok(err) = serde_json::from_str::<OAuthError>(&body) {
            return Err(err.into());
        }
        anyhow::bail!("Token request failed with status {}: {}", status, body);
    }

    Ok(serde_json::from_str(&body)?)
}

/// Single attempt, authorization codes can only be used once
pub async fn exchange_code_for_token(http: &Client, config: &AppConfig, code: &str) -> Result<OAuthToken> {
    let redirect_uri = config.oauth_redirect_uri();
    let params = [
        ("client_id", config.google_client_id.as_str()),
        ("client_secret", config.google_client_secret.as_str()),
        ("code", code),
        ("grant_type", "authorization_code"),
        ("redirect_uri", redirect_uri.as_str()),
    ];
    token_request(http, &config.google_token_url, &params, &RetryPolicy::once()).await
}

/// Google usually leaves `refresh_token` out of the response, callers
/// should keep the one they already have.
pub async fn refresh_access_token(http: &Client, config: &AppConfig, refresh_token: &str) -> Result<OAuthToken> {
    let params = [
        ("client_id", config.google_client_id.as_str()),
        ("client_secret", config.google_client_secret.as_str()),
        ("refresh_token", refresh_token),
        ("grant_type", "refresh_token"),
    ];
    token_request(http, &config.google_token_url, &params, &RetryPolicy::default()).await
}

pub async fn fetch_user_info(http: &Client, config: &AppConfig, access_token: &str) -> Result<UserInfo> {
    let url = format!("{}/oauth2/v3/userinfo", config.google_api_url);
    let res = with_retry(&RetryPolicy::default(), || {
        http.get(&url).bearer_auth(access_token).send()
    })
    .await?;

    let status = res.status();
    if !status.is_success() {
        anyhow::bail!("Fetching user info failed with status {}", status);
    }
    Ok(res.json::<UserInfo>().await?)
}

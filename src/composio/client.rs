use anyhow::{Result, anyhow};
use chrono::SecondsFormat;
use reqwest::{Client, Response};
use serde_json::{Value, json};

use super::shapes::{
    CALENDAR_APP, ConnectedAccount, extract_accounts, extract_events, find_redirect_url, pick_account,
};
use crate::core::AppConfig;
use crate::core::retry::{RetryPolicy, with_retry};
use crate::google::gcal::{EventQuery, GoogleEvent, parse_events};

pub const LIST_EVENTS_ACTION: &str = "GOOGLECALENDAR_LIST_EVENTS";

/// REST client for the connector service that holds users' Google
/// Calendar grants on our behalf.
#[derive(Clone)]
pub struct ComposioClient {
    http: Client,
    base_url: String,
    api_key: String,
    auth_config_id: Option<String>,
    retry: RetryPolicy,
}

impl ComposioClient {
    /// `None` when no connector API key is configured
    pub fn from_config(http: Client, config: &AppConfig) -> Option<Self> {
        let api_key = config.composio_api_key.clone()?;
        Some(Self {
            http,
            base_url: config.composio_api_url.clone(),
            api_key,
            auth_config_id: config.composio_auth_config_id.clone(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn read_json(res: Response) -> Result<Value> {
        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            anyhow::bail!("Connector request failed with status {}: {}", status, body);
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn list_accounts(&self, query: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/api/v1/connectedAccounts", self.base_url);
        let res = with_retry(&self.retry, || {
            self.http
                .get(&url)
                .header("x-api-key", &self.api_key)
                .query(query)
                .send()
        })
        .await?;
        Self::read_json(res).await
    }

    /// Look up the user's calendar account. The first lookup by email
    /// must succeed, later lookups (email local part, entity id, any
    /// calendar account) are best effort.
    pub async fn get_connected_account(&self, user_id: &str) -> Result<Option<ConnectedAccount>> {
        let resp = self
            .list_accounts(&[
                ("user_uuid", user_id),
                ("appNames", CALENDAR_APP),
                ("status", "ACTIVE"),
            ])
            .await
            .map_err(|e| anyhow!("Failed to get connected account: {}", e))?;
        if let Some(account) = pick_account(&extract_accounts(&resp)) {
            return Ok(Some(account));
        }

        let mut fallbacks: Vec<Vec<(&str, &str)>> = vec![];
        if let Some((local, _)) = user_id.split_once('@') {
            fallbacks.push(vec![
                ("user_uuid", local),
                ("appNames", CALENDAR_APP),
                ("status", "ACTIVE"),
            ]);
        }
        fallbacks.push(vec![("entityId", user_id), ("appNames", CALENDAR_APP)]);
        fallbacks.push(vec![("appNames", CALENDAR_APP)]);

        for query in fallbacks {
            match self.list_accounts(&query).await {
                Ok(resp) => {
                    if let Some(account) = pick_account(&extract_accounts(&resp)) {
                        return Ok(Some(account));
                    }
                }
                Err(e) => tracing::debug!("Connected account lookup failed: {}", e),
            }
        }

        Ok(None)
    }

    /// Start an OAuth connection for the user and return the URL they
    /// should be sent to.
    pub async fn initiate_connection(&self, user_id: &str, redirect_url: &str) -> Result<String> {
        let url = format!("{}/api/v1/connectedAccounts", self.base_url);
        let body = json!({
            "integrationId": self.auth_config_id,
            "entityId": user_id,
            "appName": CALENDAR_APP,
            "authMode": "OAUTH2",
            "redirectUri": redirect_url,
            "data": {},
        });
        // Single attempt, each request creates a pending connection
        let res = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let resp = Self::read_json(res).await?;

        find_redirect_url(&resp).ok_or_else(|| anyhow!("Connector response had no redirect URL"))
    }

    pub async fn execute_action(&self, account_id: &str, action: &str, input: Value) -> Result<Value> {
        let url = format!("{}/api/v2/actions/{}/execute", self.base_url, action);
        let body = json!({
            "connectedAccountId": account_id,
            "appName": CALENDAR_APP,
            "input": input,
        });
        let res = with_retry(&self.retry, || {
            self.http
                .post(&url)
                .header("x-api-key", &self.api_key)
                .json(&body)
                .send()
        })
        .await?;
        let resp = Self::read_json(res).await?;

        // The service has spelled this flag both ways
        let successful = resp
            .get("successful")
            .or_else(|| resp.get("successfull"))
            .and_then(Value::as_bool);
        if successful == Some(false) {
            let reason = resp.get("error").map(|e| e.to_string()).unwrap_or_default();
            anyhow::bail!("Failed to execute calendar action {}: {}", action, reason);
        }
        Ok(resp)
    }

    pub async fn list_events(&self, account_id: &str, params: &EventQuery) -> Result<Vec<GoogleEvent>> {
        let mut input = json!({
            "calendarId": "primary",
            "timeMin": params.time_min.to_rfc3339_opts(SecondsFormat::Secs, true),
            "maxResults": params.max_results,
            "singleEvents": true,
            "orderBy": "startTime",
        });
        if let Some(time_max) = params.time_max {
            input["timeMax"] = json!(time_max.to_rfc3339_opts(SecondsFormat::Secs, true));
        }

        let resp = self.execute_action(account_id, LIST_EVENTS_ACTION, input).await?;
        Ok(parse_events(extract_events(&resp)))
    }
}

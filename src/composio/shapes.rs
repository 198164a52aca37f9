//! Locate accounts, redirect URLs and events in connector responses
//! whose exact shape isn't guaranteed.

use std::collections::VecDeque;

use serde_json::Value;

const ACCOUNT_LIST_KEYS: [&str; 5] = ["items", "data", "results", "connectedAccounts", "accounts"];
const APP_NAME_KEYS: [&str; 4] = ["appName", "app", "integrationName", "app_slug"];
const ACCOUNT_ID_KEYS: [&str; 4] = ["id", "connectedAccountId", "account_id", "uuid"];
const STATUS_KEYS: [&str; 3] = ["status", "connectionStatus", "state"];
const REDIRECT_KEYS: [&str; 2] = ["redirectUrl", "redirect_url"];
const ACTIVE_STATUSES: [&str; 4] = ["active", "connected", "authorized", "verified"];

pub const CALENDAR_APP: &str = "googlecalendar";

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectedAccount {
    pub id: String,
    pub status: String,
    pub app_name: Option<String>,
}

/// Lowercase and strip everything but ASCII letters and digits
pub fn normalize(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn first_str<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| item.get(*key))
        .find_map(|v| v.as_str())
}

/// Breadth first search for the first value matching `pred`
fn find_bfs<'a>(root: &'a Value, pred: impl Fn(&'a Value) -> bool) -> Option<&'a Value> {
    let mut queue = VecDeque::from([root]);
    while let Some(current) = queue.pop_front() {
        if pred(current) {
            return Some(current);
        }
        match current {
            Value::Object(map) => queue.extend(map.values()),
            Value::Array(items) => queue.extend(items.iter()),
            _ => {}
        }
    }
    None
}

pub fn extract_accounts(resp: &Value) -> Vec<Value> {
    if let Value::Array(items) = resp {
        return items.clone();
    }
    if let Some(items) = ACCOUNT_LIST_KEYS
        .iter()
        .filter_map(|key| resp.get(*key))
        .find_map(|v| v.as_array())
    {
        return items.clone();
    }
    find_bfs(resp, Value::is_array)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// First calendar account with an id. Statuses that mean connected are
/// reported as `ACTIVE`, anything else is passed through uppercased.
pub fn pick_account(accounts: &[Value]) -> Option<ConnectedAccount> {
    accounts.iter().filter(|a| a.is_object()).find_map(|item| {
        let app_name = first_str(item, &APP_NAME_KEYS);
        if !normalize(app_name.unwrap_or_default()).contains(CALENDAR_APP) {
            return None;
        }
        let id = first_str(item, &ACCOUNT_ID_KEYS).filter(|id| !id.is_empty())?;

        let status = normalize(first_str(item, &STATUS_KEYS).unwrap_or_default());
        let status = if status.is_empty() || ACTIVE_STATUSES.contains(&status.as_str()) {
            "ACTIVE".to_string()
        } else {
            status.to_uppercase()
        };

        Some(ConnectedAccount {
            id: id.to_string(),
            status,
            app_name: app_name.map(String::from),
        })
    })
}

pub fn find_redirect_url(resp: &Value) -> Option<String> {
    find_bfs(resp, |v| first_str(v, &REDIRECT_KEYS).is_some())
        .and_then(|v| first_str(v, &REDIRECT_KEYS))
        .map(String::from)
}

/// The event list is the shallowest array made of objects
pub fn extract_events(resp: &Value) -> Vec<Value> {
    if let Some(items) = resp.get("items").and_then(Value::as_array) {
        return items.clone();
    }
    find_bfs(resp, |v| {
        v.as_array()
            .is_some_and(|items| !items.is_empty() && items.iter().all(Value::is_object))
    })
    .and_then(Value::as_array)
    .cloned()
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn it_finds_accounts_under_known_keys_and_nested() {
        let top = json!([{"id": "a"}]);
        assert_eq!(extract_accounts(&top).len(), 1);

        let keyed = json!({"total": 1, "connectedAccounts": [{"id": "b"}]});
        assert_eq!(extract_accounts(&keyed)[0]["id"], "b");

        let nested = json!({"page": {"body": {"list": [{"id": "c"}, {"id": "d"}]}}});
        assert_eq!(extract_accounts(&nested).len(), 2);

        assert!(extract_accounts(&json!({"nothing": true})).is_empty());
    }

    #[test]
    fn it_picks_the_calendar_account() {
        let accounts = vec![
            json!({"id": "gmail-1", "appName": "gmail", "status": "ACTIVE"}),
            json!({"appName": "googlecalendar"}),
            json!({"connectedAccountId": "cal-1", "app_slug": "Google-Calendar", "state": "Connected"}),
        ];
        let account = pick_account(&accounts).unwrap();

        assert_eq!(account.id, "cal-1");
        assert_eq!(account.status, "ACTIVE");
        assert_eq!(account.app_name.as_deref(), Some("Google-Calendar"));
    }

    #[test]
    fn it_passes_through_unknown_statuses() {
        let accounts = vec![json!({"id": "cal-1", "app": "googlecalendar", "status": "initiated"})];
        assert_eq!(pick_account(&accounts).unwrap().status, "INITIATED");
    }

    #[test]
    fn it_finds_redirect_urls_anywhere() {
        let resp = json!({"connection": {"details": {"redirect_url": "https://auth.example/x"}}});
        assert_eq!(find_redirect_url(&resp).as_deref(), Some("https://auth.example/x"));
        assert_eq!(find_redirect_url(&json!({"id": "1"})), None);
    }

    #[test]
    fn it_finds_the_event_array() {
        let resp = json!({
            "successful": true,
            "data": {"response_data": {"kind": "calendar#events", "items": [
                {"id": "e1", "attendees": [{"email": "a@example.com"}]},
                {"id": "e2"}
            ]}}
        });
        let events = extract_events(&resp);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1]["id"], "e2");

        assert!(extract_events(&json!({"data": {"items": []}})).is_empty());
    }
}

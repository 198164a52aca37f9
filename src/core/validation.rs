//! Checks for user supplied URLs

use reqwest::Url;

/// Absolute `http` or `https` URL
pub fn is_valid_url(value: &str) -> bool {
    Url::parse(value).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

/// Where to send the user after signing in. Only paths on this app or
/// absolute URLs with the same origin as `app_url` are honored,
/// anything else goes to the dashboard.
pub fn safe_callback_url(app_url: &str, value: Option<&str>) -> String {
    let fallback = format!("{}/dashboard", app_url);
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return fallback;
    };

    if value.starts_with('/') && !value.starts_with("//") {
        return format!("{}{}", app_url, value);
    }

    match (Url::parse(app_url), Url::parse(value)) {
        (Ok(app), Ok(url)) if is_valid_url(value) && app.origin() == url.origin() => value.to_string(),
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_accepts_only_http_urls() {
        assert!(is_valid_url("https://example.com/dashboard"));
        assert!(is_valid_url("http://localhost:3000"));
        assert!(!is_valid_url("javascript:alert(1)"));
        assert!(!is_valid_url("/dashboard"));
        assert!(!is_valid_url("not a url"));
    }

    #[test]
    fn it_keeps_callbacks_on_this_origin() {
        let app = "http://localhost:3000";
        assert_eq!(safe_callback_url(app, None), "http://localhost:3000/dashboard");
        assert_eq!(safe_callback_url(app, Some("/settings")), "http://localhost:3000/settings");
        assert_eq!(
            safe_callback_url(app, Some("http://localhost:3000/dashboard?tab=past")),
            "http://localhost:3000/dashboard?tab=past"
        );
        assert_eq!(safe_callback_url(app, Some("//evil.example")), "http://localhost:3000/dashboard");
        assert_eq!(
            safe_callback_url(app, Some("https://evil.example/phish")),
            "http://localhost:3000/dashboard"
        );
    }
}

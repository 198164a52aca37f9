//! Integration tests for the calendar API endpoints

mod test_utils;

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use chrono::{Duration, Utc};
    use katalyst::auth::tokens::save_token_grant;
    use katalyst::google::oauth::OAuthToken;
    use mockito::Matcher;
    use serde_json::json;
    use serial_test::serial;
    use tower::util::ServiceExt;

    use crate::test_utils::{TEST_EMAIL, body_to_json, signed_in_cookie, test_context, test_context_with};

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, cookie: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    #[serial]
    async fn it_requires_a_session() {
        let server = mockito::Server::new_async().await;
        let ctx = test_context(&server.url()).await;

        let response = ctx.app().oneshot(get("/api/calendar", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_to_json(response.into_body()).await;
        assert_eq!(body["error"], "Unauthorized");
    }

    #[tokio::test]
    #[serial]
    async fn it_rejects_an_unknown_session() {
        let server = mockito::Server::new_async().await;
        let ctx = test_context(&server.url()).await;

        let response = ctx
            .app()
            .oneshot(get("/api/calendar", Some("session-token=not-a-session")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    #[serial]
    async fn it_returns_an_empty_calendar_without_a_connection() {
        let server = mockito::Server::new_async().await;
        let ctx = test_context(&server.url()).await;
        let cookie = signed_in_cookie(&ctx.state, TEST_EMAIL).await;

        let response = ctx.app().oneshot(get("/api/calendar", Some(&cookie))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "public, max-age=300"
        );
        let body = body_to_json(response.into_body()).await;
        assert_eq!(body["hasConnection"], false);
        assert_eq!(body["upcomingMeetings"], json!([]));
        assert_eq!(body["pastMeetings"], json!([]));
        assert!(body["lastUpdated"].is_string());
    }

    #[tokio::test]
    #[serial]
    async fn it_bypasses_the_cache_on_refresh() {
        let server = mockito::Server::new_async().await;
        let ctx = test_context(&server.url()).await;
        let cookie = signed_in_cookie(&ctx.state, TEST_EMAIL).await;

        let response = ctx
            .app()
            .oneshot(get("/api/calendar?refresh=true", Some(&cookie)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-cache, no-store, must-revalidate"
        );
    }

    #[tokio::test]
    #[serial]
    async fn it_fetches_and_caches_events_with_the_users_token() {
        let mut server = mockito::Server::new_async().await;
        let ctx = test_context(&server.url()).await;
        let cookie = signed_in_cookie(&ctx.state, TEST_EMAIL).await;

        let grant = OAuthToken {
            access_token: String::from("access-123"),
            expires_in: Some(3600),
            refresh_token: Some(String::from("refresh-123")),
            scope: None,
            token_type: Some(String::from("Bearer")),
            id_token: None,
        };
        save_token_grant(&ctx.state.db, TEST_EMAIL, &grant, Utc::now())
            .await
            .unwrap();

        let start = (Utc::now() + Duration::hours(2)).to_rfc3339();
        let end = (Utc::now() + Duration::hours(3)).to_rfc3339();
        let cal_list = server
            .mock("GET", "/calendar/v3/users/me/calendarList")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer access-123")
            .with_status(200)
            .with_body(json!({"items": [{"id": "primary-id", "primary": true}]}).to_string())
            .create_async()
            .await;
        let events = server
            .mock("GET", "/calendar/v3/calendars/primary-id/events")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({"items": [{
                    "id": "evt_1",
                    "summary": "Roadmap review",
                    "start": {"dateTime": start},
                    "end": {"dateTime": end},
                    "hangoutLink": "https://meet.google.com/abc-defg-hij"
                }]})
                .to_string(),
            )
            .expect(2)
            .create_async()
            .await;

        let response = ctx.app().oneshot(get("/api/calendar", Some(&cookie))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_json(response.into_body()).await;
        assert_eq!(body["hasConnection"], true);
        assert_eq!(body["upcomingMeetings"][0]["title"], "Roadmap review");
        assert_eq!(body["upcomingMeetings"][0]["duration"], 60);
        assert_eq!(
            body["upcomingMeetings"][0]["meetingUrl"],
            "https://meet.google.com/abc-defg-hij"
        );

        // The second request is served from the cache
        let response = ctx.app().oneshot(get("/api/calendar", Some(&cookie))).await.unwrap();
        let body = body_to_json(response.into_body()).await;
        assert_eq!(body["upcomingMeetings"][0]["id"], "evt_1");

        cal_list.assert_async().await;
        events.assert_async().await;
    }

    #[tokio::test]
    #[serial]
    async fn it_falls_back_to_sign_in_for_connect() {
        let server = mockito::Server::new_async().await;
        let ctx = test_context(&server.url()).await;
        let cookie = signed_in_cookie(&ctx.state, TEST_EMAIL).await;

        let response = ctx
            .app()
            .oneshot(post_json("/api/calendar/connect", &cookie, "not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_json(response.into_body()).await;
        let expected = "http://localhost:3000/api/auth/signin?callbackUrl=http%3A%2F%2Flocalhost%3A3000%2Fdashboard";
        assert_eq!(body["redirectUrl"], expected);
        assert_eq!(body["connectionUrl"], expected);
    }

    #[tokio::test]
    #[serial]
    async fn it_ignores_an_invalid_redirect_url() {
        let server = mockito::Server::new_async().await;
        let ctx = test_context(&server.url()).await;
        let cookie = signed_in_cookie(&ctx.state, TEST_EMAIL).await;

        let response = ctx
            .app()
            .oneshot(post_json(
                "/api/calendar/connect",
                &cookie,
                r#"{"redirectUrl": "javascript:alert(1)"}"#,
            ))
            .await
            .unwrap();

        let body = body_to_json(response.into_body()).await;
        assert!(
            body["redirectUrl"]
                .as_str()
                .unwrap()
                .ends_with("callbackUrl=http%3A%2F%2Flocalhost%3A3000%2Fdashboard")
        );
    }

    #[tokio::test]
    #[serial]
    async fn it_initiates_a_connector_connection() {
        let mut server = mockito::Server::new_async().await;
        let ctx = test_context_with(&server.url(), |config| {
            config.composio_api_key = Some(String::from("composio-key"));
            config.composio_auth_config_id = Some(String::from("ac_123"));
        })
        .await;
        let cookie = signed_in_cookie(&ctx.state, TEST_EMAIL).await;

        let mock = server
            .mock("POST", "/api/v1/connectedAccounts")
            .match_header("x-api-key", "composio-key")
            .match_body(Matcher::PartialJson(json!({
                "entityId": TEST_EMAIL,
                "redirectUri": "https://app.example.com/settings"
            })))
            .with_status(200)
            .with_body(json!({"redirectUrl": "https://connect.example.com/start"}).to_string())
            .create_async()
            .await;

        let response = ctx
            .app()
            .oneshot(post_json(
                "/api/calendar/connect",
                &cookie,
                r#"{"redirectUrl": "https://app.example.com/settings"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_json(response.into_body()).await;
        assert_eq!(body["redirectUrl"], "https://connect.example.com/start");
        assert_eq!(body["connectionUrl"], "https://connect.example.com/start");
        mock.assert_async().await;
    }

    #[tokio::test]
    #[serial]
    async fn it_reports_connector_failures() {
        let mut server = mockito::Server::new_async().await;
        let ctx = test_context_with(&server.url(), |config| {
            config.composio_api_key = Some(String::from("composio-key"));
        })
        .await;
        let cookie = signed_in_cookie(&ctx.state, TEST_EMAIL).await;

        let _mock = server
            .mock("POST", "/api/v1/connectedAccounts")
            .with_status(400)
            .with_body(json!({"message": "bad integration"}).to_string())
            .create_async()
            .await;

        let response = ctx
            .app()
            .oneshot(post_json("/api/calendar/connect", &cookie, "{}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_to_json(response.into_body()).await;
        assert_eq!(body["error"], "Failed to initiate calendar connection");
    }

    #[tokio::test]
    #[serial]
    async fn it_reports_disconnected_status_without_tokens() {
        let server = mockito::Server::new_async().await;
        let ctx = test_context(&server.url()).await;
        let cookie = signed_in_cookie(&ctx.state, TEST_EMAIL).await;

        let response = ctx
            .app()
            .oneshot(get("/api/calendar/status", Some(&cookie)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_json(response.into_body()).await;
        assert_eq!(body["connected"], false);
    }

    #[tokio::test]
    #[serial]
    async fn it_sets_security_headers() {
        let server = mockito::Server::new_async().await;
        let ctx = test_context(&server.url()).await;

        let response = ctx.app().oneshot(get("/api/calendar", None)).await.unwrap();

        let headers = response.headers();
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
        assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
        assert_eq!(headers.get("referrer-policy").unwrap(), "origin-when-cross-origin");
        assert_eq!(headers.get("x-xss-protection").unwrap(), "1; mode=block");
        assert!(headers.get("content-security-policy").is_some());
    }
}

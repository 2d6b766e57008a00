use nss_auth::{Auth, AuthError, AuthOptions, SignUpOutcome};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session_body(access_token: &str, refresh_token: &str) -> serde_json::Value {
    json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": refresh_token,
        "user": {
            "id": "test_user_id",
            "email": "test@example.com",
            "app_metadata": {},
            "user_metadata": {}
        }
    })
}

fn client(server: &MockServer) -> Auth {
    Auth::new(
        &server.uri(),
        "test_anon_key",
        reqwest::Client::new(),
        AuthOptions::default(),
    )
}

#[tokio::test]
async fn test_sign_up_returns_session() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .and(header("apikey", "test_anon_key"))
        .and(body_partial_json(json!({ "data": { "role": "student" } })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(session_body("test_access_token", "test_refresh_token")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = client(&mock_server)
        .sign_up(
            "test@example.com",
            "password123",
            json!({ "role": "student" }),
        )
        .await
        .unwrap();

    match result {
        SignUpOutcome::SignedIn(session) => {
            assert_eq!(session.access_token, "test_access_token");
            assert_eq!(session.user.id, "test_user_id");
            assert!(session.expires_at.is_some());
        }
        other => panic!("expected a session, got {:?}", other),
    }
}

#[tokio::test]
async fn test_sign_up_awaiting_confirmation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pending_user",
            "email": "new@example.com"
        })))
        .mount(&mock_server)
        .await;

    let result = client(&mock_server)
        .sign_up("new@example.com", "password123", json!({}))
        .await
        .unwrap();

    assert!(matches!(result, SignUpOutcome::ConfirmationRequired(_)));
    assert_eq!(result.user().id, "pending_user");
}

#[tokio::test]
async fn test_sign_in_with_password() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(session_body("test_access_token", "test_refresh_token")),
        )
        .mount(&mock_server)
        .await;

    let session = client(&mock_server)
        .sign_in_with_password("test@example.com", "password123")
        .await
        .unwrap();

    assert_eq!(session.access_token, "test_access_token");
    assert_eq!(session.user.email, Some("test@example.com".to_string()));
}

#[tokio::test]
async fn test_sign_in_failure_keeps_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        })))
        .mount(&mock_server)
        .await;

    let err = client(&mock_server)
        .sign_in_with_password("wrong@example.com", "wrong")
        .await
        .unwrap_err();

    match err {
        AuthError::ApiError { status, message } => {
            assert_eq!(status.as_u16(), 400);
            assert!(message.contains("invalid_grant"));
        }
        e => panic!("Expected ApiError, got {:?}", e),
    }
}

#[tokio::test]
async fn test_refresh_and_sign_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(session_body("old_access", "old_refresh")),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "refresh_token"))
        .and(body_partial_json(json!({ "refresh_token": "old_refresh" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(session_body("new_access", "new_refresh")),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .and(header("Authorization", "Bearer new_access"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let auth = client(&mock_server);
    let session = auth
        .sign_in_with_password("test@example.com", "password123")
        .await
        .unwrap();
    let refreshed = auth.refresh_session(&session).await.unwrap();
    assert_eq!(refreshed.access_token, "new_access");
    assert_eq!(refreshed.refresh_token, "new_refresh");

    auth.sign_out(refreshed).await.unwrap();
}

#[tokio::test]
async fn test_get_user_rejects_expired_session() {
    let mock_server = MockServer::start().await;

    let mut body = session_body("expired", "r");
    body["expires_at"] = json!(1);
    let session: nss_auth::Session = serde_json::from_value(body).unwrap();

    let err = client(&mock_server).get_user(&session).await.unwrap_err();
    assert!(matches!(err, AuthError::SessionExpired));
}

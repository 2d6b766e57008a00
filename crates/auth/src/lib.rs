//! Supabase Auth (GoTrue) client for the NSS platform
//!
//! This crate covers the authentication calls the platform needs:
//! sign up with profile metadata, password sign in, session refresh,
//! current user lookup and sign out.
//!
//! The client keeps no session of its own. Every call that acts on behalf
//! of a signed-in user takes the [`Session`] explicitly, and [`Auth::sign_out`]
//! consumes it.

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// エラー型
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("API error: {message} (Status: {status})")]
    ApiError { status: StatusCode, message: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Missing session")]
    MissingSession,

    #[error("Session expired")]
    SessionExpired,
}

impl AuthError {
    /// HTTP status of the failed call, when the backend answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            AuthError::ApiError { status, .. } => Some(*status),
            AuthError::NetworkError(e) => e.status(),
            _ => None,
        }
    }
}

/// ユーザー情報
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub app_metadata: Value,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// セッション情報
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    /// Unix timestamp after which the access token is rejected
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub token_type: String,
    pub user: User,
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs() as i64
}

impl Session {
    /// Fill in `expires_at` from `expires_in` when the server left it out.
    fn stamped(mut self) -> Self {
        if self.expires_at.is_none() {
            self.expires_at = Some(unix_now() + self.expires_in);
        }
        self
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => unix_now() >= expires_at,
            None => false,
        }
    }
}

/// Result of a sign up call.
///
/// Projects with email confirmation enabled answer with the bare user and
/// no session.
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    SignedIn(Session),
    ConfirmationRequired(User),
}

impl SignUpOutcome {
    pub fn user(&self) -> &User {
        match self {
            SignUpOutcome::SignedIn(session) => &session.user,
            SignUpOutcome::ConfirmationRequired(user) => user,
        }
    }
}

/// クライアントオプション
#[derive(Debug, Clone)]
pub struct AuthOptions {
    /// Value sent in the `X-Client-Info` header
    pub client_info: String,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            client_info: format!("nss-auth/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Supabase Auth クライアント
#[derive(Debug, Clone)]
pub struct Auth {
    url: String,
    key: String,
    http_client: Client,
    options: AuthOptions,
}

async fn api_error(response: Response) -> AuthError {
    let status = response.status();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error response".to_string());
    AuthError::ApiError { status, message }
}

impl Auth {
    /// 新しい Auth クライアントを作成
    pub fn new(url: &str, key: &str, http_client: Client, options: AuthOptions) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            http_client,
            options,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.url, path)
    }

    /// ユーザー登録
    ///
    /// `metadata` is stored as the user's `user_metadata` (full name, requested
    /// role, unit).
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Value,
    ) -> Result<SignUpOutcome, AuthError> {
        let payload = serde_json::json!({
            "email": email,
            "password": password,
            "data": metadata,
        });

        let response = self
            .http_client
            .post(self.endpoint("/signup"))
            .header("apikey", &self.key)
            .header("X-Client-Info", &self.options.client_info)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body: Value = response.json().await?;
        if body.get("access_token").is_some() {
            let session: Session = serde_json::from_value(body)?;
            log::debug!("sign up returned a session for {}", session.user.id);
            Ok(SignUpOutcome::SignedIn(session.stamped()))
        } else {
            let user: User = serde_json::from_value(body)?;
            log::debug!("sign up for {} awaits email confirmation", user.id);
            Ok(SignUpOutcome::ConfirmationRequired(user))
        }
    }

    /// メール・パスワードでログイン
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let payload = serde_json::json!({
            "email": email,
            "password": password,
        });

        let response = self
            .http_client
            .post(self.endpoint("/token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.key)
            .header("X-Client-Info", &self.options.client_info)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let session: Session = response.json().await?;
        Ok(session.stamped())
    }

    /// セッションをリフレッシュ
    pub async fn refresh_session(&self, session: &Session) -> Result<Session, AuthError> {
        let payload = serde_json::json!({
            "refresh_token": session.refresh_token,
        });

        let response = self
            .http_client
            .post(self.endpoint("/token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.key)
            .header("X-Client-Info", &self.options.client_info)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let new_session: Session = response.json().await?;
        Ok(new_session.stamped())
    }

    /// 現在のユーザーを取得
    pub async fn get_user(&self, session: &Session) -> Result<User, AuthError> {
        if session.is_expired() {
            return Err(AuthError::SessionExpired);
        }

        let response = self
            .http_client
            .get(self.endpoint("/user"))
            .header("apikey", &self.key)
            .header("X-Client-Info", &self.options.client_info)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.json().await?)
    }

    /// サインアウト
    ///
    /// The session is consumed; the caller cannot keep using the token.
    pub async fn sign_out(&self, session: Session) -> Result<(), AuthError> {
        let response = self
            .http_client
            .post(self.endpoint("/logout"))
            .header("apikey", &self.key)
            .header("X-Client-Info", &self.options.client_info)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        log::debug!("signed out {}", session.user.id);
        Ok(())
    }

    /// パスワードリセットメールの送信
    pub async fn reset_password_for_email(&self, email: &str) -> Result<(), AuthError> {
        let payload = serde_json::json!({ "email": email });

        let response = self
            .http_client
            .post(self.endpoint("/recover"))
            .header("apikey", &self.key)
            .header("X-Client-Info", &self.options.client_info)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_at: Option<i64>) -> Session {
        Session {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            expires_in: 3600,
            expires_at,
            token_type: "bearer".to_string(),
            user: User {
                id: "u1".to_string(),
                email: None,
                phone: None,
                app_metadata: Value::Null,
                user_metadata: Value::Null,
                created_at: None,
                updated_at: None,
            },
        }
    }

    #[test]
    fn stamped_fills_missing_expiry() {
        let s = session(None).stamped();
        assert!(s.expires_at.is_some());
        assert!(!s.is_expired());
    }

    #[test]
    fn past_expiry_is_expired() {
        assert!(session(Some(1)).is_expired());
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let auth = Auth::new(
            "http://localhost:54321/",
            "key",
            Client::new(),
            AuthOptions::default(),
        );
        assert_eq!(auth.endpoint("/user"), "http://localhost:54321/auth/v1/user");
    }
}

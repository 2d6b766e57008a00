//! Supabase PostgREST client for the NSS platform
//!
//! Covers the subset of the PostgREST dialect the platform's record store
//! uses:
//!
//! - `select` with filters, ordering and limits
//! - `insert` returning the stored rows
//! - filtered `update` returning the rows that matched, which is how the
//!   store detects that a row moved away from the expected state
//! - RPC function calls

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use url::Url;

/// PostgREST APIエラーの詳細情報
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PostgrestApiErrorDetails {
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
    pub hint: Option<String>,
}

impl fmt::Display for PostgrestApiErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(code) = &self.code {
            parts.push(format!("Code: {}", code));
        }
        if let Some(message) = &self.message {
            parts.push(format!("Message: {}", message));
        }
        if let Some(details) = &self.details {
            parts.push(format!("Details: {}", details));
        }
        if let Some(hint) = &self.hint {
            parts.push(format!("Hint: {}", hint));
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// エラー型
#[derive(Error, Debug)]
pub enum PostgrestError {
    #[error("API error: {details} (Status: {status})")]
    ApiError {
        details: PostgrestApiErrorDetails,
        status: StatusCode,
    },

    #[error("API error (unparsed): {message} (Status: {status})")]
    UnparsedApiError { message: String, status: StatusCode },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

impl PostgrestError {
    /// HTTP status of the failed call, when the server answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            PostgrestError::ApiError { status, .. } => Some(*status),
            PostgrestError::UnparsedApiError { status, .. } => Some(*status),
            PostgrestError::NetworkError(e) => e.status(),
            _ => None,
        }
    }

    /// Postgres error code (e.g. `23505` for a unique violation), if reported.
    pub fn code(&self) -> Option<&str> {
        match self {
            PostgrestError::ApiError { details, .. } => details.code.as_deref(),
            _ => None,
        }
    }
}

/// ソート方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

async fn error_from_response(response: Response) -> PostgrestError {
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error response".to_string());

    match serde_json::from_str::<PostgrestApiErrorDetails>(&error_text) {
        Ok(details) => PostgrestError::ApiError { details, status },
        Err(_) => PostgrestError::UnparsedApiError {
            message: error_text,
            status,
        },
    }
}

/// Read a `return=representation` body. Empty bodies are treated as no rows.
async fn rows_from_response<R: DeserializeOwned>(
    response: Response,
) -> Result<Vec<R>, PostgrestError> {
    let body_text = response.text().await.map_err(|e| {
        PostgrestError::DeserializationError(format!("Failed to read response body: {}", e))
    })?;

    if body_text.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str::<Vec<R>>(&body_text)
        .map_err(|e| PostgrestError::DeserializationError(e.to_string()))
}

/// PostgREST クライアント
///
/// One client addresses one table (or one RPC function). Filters are kept in
/// insertion order so the generated URL is stable.
#[derive(Debug, Clone)]
pub struct PostgrestClient {
    base_url: String,
    table: String,
    http_client: Client,
    headers: HeaderMap,
    query_params: Vec<(String, String)>,
    rpc_params: Option<Value>,
}

impl PostgrestClient {
    /// 新しい PostgreST クライアントを作成
    pub fn new(
        base_url: &str,
        api_key: &str,
        table: &str,
        http_client: Client,
    ) -> Result<Self, PostgrestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(api_key).map_err(|_| {
                PostgrestError::InvalidParameters("API key is not a valid header value".to_string())
            })?,
        );
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            table: table.to_string(),
            http_client,
            headers,
            query_params: Vec::new(),
            rpc_params: None,
        })
    }

    /// RPCリクエストを作成
    pub fn rpc(
        base_url: &str,
        api_key: &str,
        function_name: &str,
        params: Value,
        http_client: Client,
    ) -> Result<Self, PostgrestError> {
        let mut client = Self::new(base_url, api_key, function_name, http_client)?;
        client.rpc_params = Some(params);
        Ok(client)
    }

    /// ヘッダーを追加
    pub fn with_header(mut self, key: &str, value: &str) -> Result<Self, PostgrestError> {
        let header_value = HeaderValue::from_str(value).map_err(|_| {
            PostgrestError::InvalidParameters(format!("Invalid header value: {}", value))
        })?;
        let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
            PostgrestError::InvalidParameters(format!("Invalid header name: {}", key))
        })?;

        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// 認証トークンを設定
    pub fn with_auth(self, token: &str) -> Result<Self, PostgrestError> {
        self.with_header("Authorization", &format!("Bearer {}", token))
    }

    /// スキーマを指定（デフォルトのpublicスキーマではない場合）
    pub fn with_schema(self, schema_name: &str) -> Result<Self, PostgrestError> {
        if schema_name == "public" {
            return Ok(self);
        }
        self.with_header("Accept-Profile", schema_name)?
            .with_header("Content-Profile", schema_name)
    }

    fn push_param(mut self, key: &str, value: String) -> Self {
        self.query_params.push((key.to_string(), value));
        self
    }

    /// 取得するカラムを指定
    pub fn select(mut self, columns: &str) -> Self {
        self.query_params.retain(|(k, _)| k != "select");
        self.push_param("select", columns.to_string())
    }

    /// 等価フィルター
    pub fn eq(self, column: &str, value: &str) -> Self {
        self.push_param(column, format!("eq.{}", value))
    }

    /// ソート順を指定
    pub fn order(self, column: &str, order: SortOrder) -> Self {
        let order_str = match order {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        };
        self.push_param("order", format!("{}.{}", column, order_str))
    }

    /// 取得件数を制限
    pub fn limit(self, count: u32) -> Self {
        self.push_param("limit", count.to_string())
    }

    // URLを構築
    fn build_url(&self) -> Result<Url, PostgrestError> {
        let path = if self.rpc_params.is_some() {
            format!("{}/rest/v1/rpc/{}", self.base_url, self.table)
        } else {
            format!("{}/rest/v1/{}", self.base_url, self.table)
        };
        let mut url = Url::parse(&path)?;

        if !self.query_params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query_params {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    fn representation_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        headers.insert(
            HeaderName::from_static("prefer"),
            HeaderValue::from_static("return=representation"),
        );
        headers
    }

    /// データを取得
    pub async fn execute<T: DeserializeOwned>(&self) -> Result<Vec<T>, PostgrestError> {
        let url = self.build_url()?;
        log::debug!("GET {}", url);

        let response = self
            .http_client
            .get(url)
            .headers(self.headers.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| PostgrestError::DeserializationError(e.to_string()))
    }

    /// 先頭の一行だけを取得
    pub async fn execute_one<T: DeserializeOwned>(&self) -> Result<Option<T>, PostgrestError> {
        let rows = self.clone().limit(1).execute::<T>().await?;
        Ok(rows.into_iter().next())
    }

    /// データを挿入
    pub async fn insert<T: Serialize, R: DeserializeOwned>(
        &self,
        values: &T,
    ) -> Result<Vec<R>, PostgrestError> {
        let url = self.build_url()?;
        log::debug!("POST {}", url);

        let response = self
            .http_client
            .post(url)
            .headers(self.representation_headers())
            .json(values)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        rows_from_response(response).await
    }

    /// データを更新
    ///
    /// Only rows matching every filter are touched, and only those are
    /// returned. An empty result means nothing matched.
    pub async fn update<T: Serialize, R: DeserializeOwned>(
        &self,
        values: &T,
    ) -> Result<Vec<R>, PostgrestError> {
        if self.query_params.is_empty() {
            return Err(PostgrestError::InvalidParameters(
                "Refusing to update without filters".to_string(),
            ));
        }

        let url = self.build_url()?;
        log::debug!("PATCH {}", url);

        let response = self
            .http_client
            .patch(url)
            .headers(self.representation_headers())
            .json(values)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        rows_from_response(response).await
    }

    /// RPC関数を呼び出す (POSTリクエスト)
    pub async fn call_rpc<T: DeserializeOwned>(&self) -> Result<T, PostgrestError> {
        let params = self.rpc_params.as_ref().ok_or_else(|| {
            PostgrestError::InvalidParameters(
                "Client was not created for RPC. Use PostgrestClient::rpc().".to_string(),
            )
        })?;

        let url = self.build_url()?;
        log::debug!("POST {}", url);

        let response = self
            .http_client
            .post(url)
            .headers(self.headers.clone())
            .json(params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body_text = response.text().await?;
        // void functions answer with an empty body
        let body = if body_text.trim().is_empty() {
            "null"
        } else {
            body_text.as_str()
        };

        serde_json::from_str::<T>(body).map_err(|e| {
            PostgrestError::DeserializationError(format!(
                "Failed to deserialize RPC response: {}",
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_select_with_filters() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/rest/v1/units"))
            .and(query_param("select", "*"))
            .and(query_param("district", "eq.Pune"))
            .and(query_param("order", "unit_number.asc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "id": "u1", "unit_number": "NSS-01" },
                { "id": "u2", "unit_number": "NSS-02" }
            ])))
            .mount(&mock_server)
            .await;

        let client =
            PostgrestClient::new(&mock_server.uri(), "fake-key", "units", Client::new()).unwrap();

        let data = client
            .select("*")
            .eq("district", "Pune")
            .order("unit_number", SortOrder::Ascending)
            .execute::<Value>()
            .await
            .unwrap();

        assert_eq!(data.len(), 2);
        assert_eq!(
            data.first()
                .and_then(|v| v.get("unit_number"))
                .and_then(Value::as_str),
            Some("NSS-01")
        );
    }

    #[tokio::test]
    async fn test_insert_returns_rows() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/profiles"))
            .and(header("prefer", "return=representation"))
            .and(header("Authorization", "Bearer user-token"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!([{ "id": "p1", "role": "student" }])),
            )
            .mount(&mock_server)
            .await;

        let client = PostgrestClient::new(&mock_server.uri(), "fake-key", "profiles", Client::new())
            .unwrap()
            .with_auth("user-token")
            .unwrap();

        let rows: Vec<Value> = client
            .insert(&json!({ "id": "p1", "role": "student" }))
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["role"], "student");
    }

    #[tokio::test]
    async fn test_conditional_update_without_match_is_empty() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/rest/v1/activity_submissions"))
            .and(query_param("id", "eq.s1"))
            .and(query_param("status", "eq.pending"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&mock_server)
            .await;

        let client = PostgrestClient::new(
            &mock_server.uri(),
            "fake-key",
            "activity_submissions",
            Client::new(),
        )
        .unwrap();

        let rows: Vec<Value> = client
            .eq("id", "s1")
            .eq("status", "pending")
            .update(&json!({ "status": "approved" }))
            .await
            .unwrap();

        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_update_requires_filters() {
        let client =
            PostgrestClient::new("http://localhost:1", "fake-key", "profiles", Client::new())
                .unwrap();

        let err = client
            .update::<_, Value>(&json!({ "role": "admin" }))
            .await
            .unwrap_err();

        assert!(matches!(err, PostgrestError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn test_api_error_details() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/volunteer_profiles"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint",
                "details": null,
                "hint": null
            })))
            .mount(&mock_server)
            .await;

        let client = PostgrestClient::new(
            &mock_server.uri(),
            "fake-key",
            "volunteer_profiles",
            Client::new(),
        )
        .unwrap();

        let err = client
            .insert::<_, Value>(&json!({ "user_id": "u1" }))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(StatusCode::CONFLICT));
        assert_eq!(err.code(), Some("23505"));
    }

    #[tokio::test]
    async fn test_rpc() {
        let mock_server = MockServer::start().await;

        let rpc_params = json!({ "user_id": "u1" });
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/sync_role_claim"))
            .and(body_json(&rpc_params))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!("unit")))
            .mount(&mock_server)
            .await;

        let client = PostgrestClient::rpc(
            &mock_server.uri(),
            "fake-key",
            "sync_role_claim",
            rpc_params.clone(),
            Client::new(),
        )
        .unwrap();

        let role: String = client.call_rpc().await.unwrap();
        assert_eq!(role, "unit");
    }

    #[tokio::test]
    async fn test_void_rpc() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/touch"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let client = PostgrestClient::rpc(
            &mock_server.uri(),
            "fake-key",
            "touch",
            json!({}),
            Client::new(),
        )
        .unwrap();

        let result: Option<Value> = client.call_rpc().await.unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_call_rpc_on_table_client_fails() {
        let client =
            PostgrestClient::new("http://localhost:1", "fake-key", "units", Client::new()).unwrap();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let err = rt.block_on(client.call_rpc::<Value>()).unwrap_err();
        assert!(matches!(err, PostgrestError::InvalidParameters(_)));
    }
}

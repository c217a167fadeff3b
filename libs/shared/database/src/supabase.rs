use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

use crate::error::DatabaseError;

/// Thin PostgREST client. Requests run with the caller's bearer token so
/// row-level security applies; the service-role client is reserved for flows
/// that run before a user has a token (OTP login).
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    api_key: String,
    default_token: Option<String>,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            api_key: config.supabase_anon_key.clone(),
            default_token: None,
        }
    }

    pub fn service_role(config: &AppConfig) -> Self {
        if !config.has_service_role() {
            warn!("SUPABASE_SERVICE_ROLE_KEY missing, service requests will use the anon key");
        }
        let key = if config.has_service_role() {
            config.supabase_service_role_key.clone()
        } else {
            config.supabase_anon_key.clone()
        };

        Self {
            client: Client::new(),
            base_url: config.supabase_url.clone(),
            api_key: key.clone(),
            default_token: Some(key),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, DatabaseError> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", header_value(&self.api_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token.or(self.default_token.as_deref()) {
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", token))?);
        }

        Ok(headers)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<reqwest::Response, DatabaseError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("API error ({}): {}", status, error_text);
            return Err(DatabaseError::from_response(status, error_text));
        }

        Ok(response)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T, DatabaseError>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        headers: Option<HeaderMap>,
    ) -> Result<T, DatabaseError>
    where T: DeserializeOwned {
        let response = self.send(method, path, auth_token, body, headers).await?;

        if response.status() == StatusCode::NO_CONTENT {
            return serde_json::from_value(Value::Array(vec![])).map_err(DatabaseError::Decode);
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return serde_json::from_value(Value::Array(vec![])).map_err(DatabaseError::Decode);
        }

        serde_json::from_slice(&bytes).map_err(DatabaseError::Decode)
    }

    /// Fire a request whose response body is irrelevant (deletes, bulk patches).
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(), DatabaseError> {
        self.send(method, path, auth_token, body, None).await?;
        Ok(())
    }

    /// Insert one row and return it as stored.
    pub async fn insert<T>(&self, table: &str, auth_token: Option<&str>, row: Value) -> Result<T, DatabaseError>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/{}", table);
        let mut rows: Vec<T> = self
            .request_with_headers(Method::POST, &path, auth_token, Some(row), Some(return_representation()))
            .await?;

        if rows.is_empty() {
            return Err(DatabaseError::EmptyResult(format!("insert into {}", table)));
        }
        Ok(rows.remove(0))
    }

    /// Insert several rows in one round trip.
    pub async fn insert_many<T>(&self, table: &str, auth_token: Option<&str>, rows: Vec<Value>) -> Result<Vec<T>, DatabaseError>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/{}", table);
        self.request_with_headers(Method::POST, &path, auth_token, Some(Value::Array(rows)), Some(return_representation()))
            .await
    }

    /// Patch rows matching `filter` and return the first updated row.
    pub async fn update<T>(&self, table: &str, filter: &str, auth_token: Option<&str>, changes: Value) -> Result<T, DatabaseError>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/{}?{}", table, filter);
        let mut rows: Vec<T> = self
            .request_with_headers(Method::PATCH, &path, auth_token, Some(changes), Some(return_representation()))
            .await?;

        if rows.is_empty() {
            return Err(DatabaseError::NotFound(format!("no {} row matched {}", table, filter)));
        }
        Ok(rows.remove(0))
    }

    /// Patch every row matching `filter`; an empty result is not an error.
    pub async fn update_many<T>(&self, table: &str, filter: &str, auth_token: Option<&str>, changes: Value) -> Result<Vec<T>, DatabaseError>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/{}?{}", table, filter);
        self.request_with_headers(Method::PATCH, &path, auth_token, Some(changes), Some(return_representation()))
            .await
    }

    /// Delete rows matching `filter` and return what was removed.
    pub async fn delete<T>(&self, table: &str, filter: &str, auth_token: Option<&str>) -> Result<Vec<T>, DatabaseError>
    where T: DeserializeOwned {
        let path = format!("/rest/v1/{}?{}", table, filter);
        self.request_with_headers(Method::DELETE, &path, auth_token, None, Some(return_representation()))
            .await
    }

    /// Fetch the rows of `table` matching a PostgREST query string.
    pub async fn select<T>(&self, table: &str, query: &str, auth_token: Option<&str>) -> Result<Vec<T>, DatabaseError>
    where T: DeserializeOwned {
        let path = if query.is_empty() {
            format!("/rest/v1/{}", table)
        } else {
            format!("/rest/v1/{}?{}", table, query)
        };
        self.request(Method::GET, &path, auth_token, None).await
    }

    /// Fetch at most one row; `None` when nothing matches.
    pub async fn select_one<T>(&self, table: &str, query: &str, auth_token: Option<&str>) -> Result<Option<T>, DatabaseError>
    where T: DeserializeOwned {
        let mut rows: Vec<T> = self.select(table, query, auth_token).await?;
        Ok(if rows.is_empty() { None } else { Some(rows.remove(0)) })
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

pub fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

fn header_value(raw: &str) -> Result<HeaderValue, DatabaseError> {
    HeaderValue::from_str(raw).map_err(|_| DatabaseError::InvalidHeader)
}

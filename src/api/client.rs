//! reqwest client for the HR REST API

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use super::auth::{AuthSession, SessionUser, Tokens};
use super::catalog::parse_catalog;
use super::choices::{parse_options_choices, ChoiceMap};
use super::{
    ApiError, CatalogEntry, CatalogKind, CatalogSource, RecordSource, Saved, SubmissionGateway,
    SubmitError,
};
use crate::config::ApiConfig;
use crate::records::{normalize_record, to_payload, FieldKind, Record, RecordKind};

/// Token endpoints, tried in order until one issues a token pair
const LOGIN_PATHS: &[&str] = &["/token/", "/auth/jwt/create/", "/v1/token/"];

/// Current-user endpoints, tried in order
const ME_PATHS: &[&str] = &["/me", "/me/", "/v1/me", "/v1/me/", "/auth/users/me/"];

/// HR API client
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    auth: AuthSession,
    retries: usize,
    choices: Mutex<HashMap<RecordKind, Option<ChoiceMap>>>,
}

impl HttpClient {
    pub fn new(config: &ApiConfig, auth: AuthSession) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("hrdesk/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()
            .map_err(|e| ApiError::network(&config.base_url, e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth,
            retries: config.retries,
            choices: Mutex::new(HashMap::new()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn retry_strategy(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(300))
            .with_max_delay(Duration::from_secs(5))
            .with_max_times(self.retries)
    }

    /// Send a request and return the status with the decoded body.
    ///
    /// Non-JSON bodies come back as a JSON string, empty ones as `null`.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<(u16, Value), ApiError> {
        let mut request = self
            .client
            .request(method, self.url(path))
            .header("Accept", "application/json");
        if let Some(token) = self.auth.access_token() {
            request = request.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::network(path, e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::network(path, e.to_string()))?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok((status, body))
    }

    async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let (status, body) = self.execute(Method::GET, path, None).await?;
        expect_success(path, status, body)
    }

    /// GET with exponential backoff on transient failures
    async fn get_json_with_retry(&self, path: &str) -> Result<Value, ApiError> {
        let op = || async { self.get_json(path).await };

        op.retry(self.retry_strategy())
            .when(ApiError::is_transient)
            .notify(|err, dur| {
                warn!("Retrying {} after {:?}: {}", path, dur, err);
            })
            .await
    }

    /// Server-declared choices for the record's choice fields, fetched once.
    ///
    /// An unavailable OPTIONS endpoint is remembered as "no choices".
    pub async fn fetch_choices(&self, kind: RecordKind) -> Option<ChoiceMap> {
        if let Ok(cache) = self.choices.lock() {
            if let Some(known) = cache.get(&kind) {
                return known.clone();
            }
        }

        let schema = kind.schema();
        let fields: Vec<&str> = schema
            .fields
            .iter()
            .filter(|f| f.kind == FieldKind::Choice)
            .map(|f| f.name)
            .collect();

        let path = kind.api_path();
        let choices = match self.execute(Method::OPTIONS, path, None).await {
            Ok((200..=299, body)) => Some(parse_options_choices(&body, &fields)),
            Ok((status, _)) => {
                debug!(path, status, "no choice metadata");
                None
            }
            Err(err) => {
                debug!(error = %err, "choice metadata unavailable");
                None
            }
        };

        if let Ok(mut cache) = self.choices.lock() {
            cache.insert(kind, choices.clone());
        }
        choices
    }

    /// Exchange credentials for a token pair
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Tokens, ApiError> {
        let credentials = json!({ "username": username, "password": password });
        let mut last_error = ApiError::http(LOGIN_PATHS[0], 404, "no token endpoint");

        for path in LOGIN_PATHS {
            let (status, body) = self
                .execute(Method::POST, path, Some(&credentials))
                .await?;
            match status {
                200..=299 => {
                    let tokens: Tokens = serde_json::from_value(body)
                        .map_err(|e| ApiError::parse(*path, e.to_string()))?;
                    info!(path, "token issued");
                    return Ok(tokens);
                }
                404 | 405 => {
                    debug!(path, status, "token endpoint not available");
                    last_error = ApiError::http(*path, status, body_message(&body));
                }
                _ => return Err(expect_success(path, status, body).err().unwrap_or(last_error)),
            }
        }

        Err(last_error)
    }

    /// The signed-in user as reported by the server
    pub async fn me(&self) -> Result<SessionUser, ApiError> {
        let mut last_error = ApiError::http(ME_PATHS[0], 404, "no user endpoint");

        for path in ME_PATHS {
            match self.get_json(path).await {
                Ok(body) => {
                    return serde_json::from_value(body)
                        .map_err(|e| ApiError::parse(*path, e.to_string()));
                }
                Err(err @ ApiError::HttpError { status: 404 | 405, .. }) => last_error = err,
                Err(err) => return Err(err),
            }
        }

        Err(last_error)
    }
}

/// Map a non-2xx status onto [`ApiError`]
fn expect_success(endpoint: &str, status: u16, body: Value) -> Result<Value, ApiError> {
    match status {
        200..=299 => Ok(body),
        401 => Err(ApiError::unauthorized(endpoint)),
        403 => Err(ApiError::forbidden(endpoint)),
        status => Err(ApiError::http(endpoint, status, body_message(&body))),
    }
}

/// Human-readable text for an error body: `detail` when present, else pretty JSON
fn body_message(body: &Value) -> String {
    match body {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other
            .get("detail")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| serde_json::to_string_pretty(other).unwrap_or_default()),
    }
}

/// Read a validation error body (`{"field": ["msg", ...], ...}`) into a map.
///
/// Values may be a string, a list of strings or anything else (kept as its
/// JSON text). Returns `None` when the body is not an object.
pub fn parse_field_errors(body: &Value) -> Option<BTreeMap<String, Vec<String>>> {
    let map = body.as_object()?;
    let errors = map
        .iter()
        .map(|(field, value)| {
            let messages = match value {
                Value::String(s) => vec![s.clone()],
                Value::Array(items) => items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
                other => vec![other.to_string()],
            };
            (field.clone(), messages)
        })
        .collect();
    Some(errors)
}

#[async_trait]
impl CatalogSource for HttpClient {
    async fn fetch(&self, kind: CatalogKind) -> Result<Vec<CatalogEntry>, ApiError> {
        let body = self.get_json_with_retry(kind.api_path()).await?;
        Ok(parse_catalog(&body))
    }
}

#[async_trait]
impl RecordSource for HttpClient {
    async fn fetch_record(&self, kind: RecordKind, id: i64) -> Result<Record, ApiError> {
        let path = format!("{}{}/", kind.api_path(), id);
        let body = self.get_json_with_retry(&path).await?;
        let mut record = normalize_record(&kind.schema(), &body);
        record.id = Some(id);
        Ok(record)
    }
}

#[async_trait]
impl SubmissionGateway for HttpClient {
    #[instrument(skip(self, record), fields(id = ?record.id))]
    async fn submit(&self, kind: RecordKind, record: &Record) -> Result<Saved, SubmitError> {
        let choices = self.fetch_choices(kind).await;
        let payload = Value::Object(to_payload(&kind.schema(), record, choices.as_ref()));

        let (method, path) = match record.id {
            None => (Method::POST, kind.api_path().to_string()),
            Some(id) => (Method::PATCH, format!("{}{}/", kind.api_path(), id)),
        };

        let (status, body) = self.execute(method, &path, Some(&payload)).await?;
        if status == 400 {
            if let Some(errors) = parse_field_errors(&body) {
                info!(fields = errors.len(), "server rejected submission");
                return Err(SubmitError::Fields(errors));
            }
        }

        let body = expect_success(&path, status, body)?;
        let id = body.get("id").and_then(Value::as_i64).or(record.id);
        info!(kind = kind.label(), ?id, "record saved");
        Ok(Saved { id })
    }
}

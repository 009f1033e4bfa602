//! HTTP client for the remote record store.
//!
//! Every call is a POST of `{userId, dataType, data, action}` to a single
//! endpoint. Transport failures, timeouts, 5xx and auth rejections all map
//! to `StoreUnavailable` so callers fall back to the local cache.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::remote::MemoryRecordStore;
use super::{RecordStore, ResetScope, ResetSummary, SaveSummary, SyncError};
use crate::records::{Category, CategoryPayload, OwnerId, RecordError, UserSnapshot};
use crate::storage::config::StoreSettings;

/// `dataType` value requesting every category.
const ALL_CATEGORIES: &str = "all";

/// Remote record store reached over HTTP.
pub struct HttpRecordStore {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    user_id: &'a str,
    data_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    action: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    /// Top-level fields not named below; a fetch carries its categories here
    #[serde(flatten)]
    fields: Map<String, Value>,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    created_count: Option<usize>,
    #[serde(default)]
    updated_count: Option<usize>,
    #[serde(default)]
    deleted_count: Option<usize>,
}

impl HttpRecordStore {
    /// Create a client for `endpoint` with a per-request timeout.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Config(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    async fn post(&self, request: &WireRequest<'_>) -> Result<WireResponse, SyncError> {
        let mut builder = self.http.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| SyncError::StoreUnavailable(e.to_string()))?;

        let status = response.status();
        if let Some(err) = unavailable_status(status) {
            return Err(err);
        }

        let body: WireResponse = response
            .json()
            .await
            .map_err(|e| SyncError::StoreUnavailable(format!("unreadable response: {}", e)))?;

        check_body(status, body)
    }
}

/// Statuses that mean the store cannot be reached or will not answer.
fn unavailable_status(status: StatusCode) -> Option<SyncError> {
    let unavailable = status.is_server_error()
        || status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || status == StatusCode::TOO_MANY_REQUESTS;
    unavailable.then(|| SyncError::StoreUnavailable(format!("store returned status {}", status)))
}

/// A readable body: client errors and `success: false` are rejections.
fn check_body(status: StatusCode, body: WireResponse) -> Result<WireResponse, SyncError> {
    if status.is_client_error() || !body.success {
        let reason = body
            .error
            .or(body.message)
            .unwrap_or_else(|| format!("store returned status {}", status));
        return Err(SyncError::Record(RecordError::MalformedPayload(reason)));
    }
    Ok(body)
}

/// Response keys a category may arrive under, preferred first.
fn response_keys(category: Category) -> &'static [&'static str] {
    match category {
        Category::WorkoutPlan => &["workouts", "workout", "workoutPlan"],
        Category::DietPlan => &["dietPlans", "dietPlan"],
        Category::WorkoutHistory => &["workoutHistory"],
        Category::DietHistory => &["dietHistory"],
        Category::Preferences => &["preferences"],
    }
}

/// Build a snapshot from a fetch response.
///
/// Categories sit at the top level of the body, or inside a `data` object.
/// A body naming no category at all, a `data` that is not an object, or a
/// category that fails to parse makes the remote state unknown, never empty.
fn parse_snapshot(data: Option<Value>, top_level: Map<String, Value>) -> Result<UserSnapshot, SyncError> {
    let mut fields = match data {
        Some(Value::Object(fields)) => fields,
        None | Some(Value::Null) => top_level,
        Some(other) => {
            return Err(SyncError::StoreUnavailable(format!(
                "fetch data is not an object: {}",
                other
            )))
        }
    };

    let mut snapshot = UserSnapshot::default();
    let mut seen = 0;
    for category in Category::all() {
        let Some(value) = response_keys(*category)
            .iter()
            .find_map(|key| fields.remove(*key))
        else {
            continue;
        };
        seen += 1;
        if value.is_null() {
            continue;
        }
        let payload = CategoryPayload::from_json(*category, value).map_err(|e| {
            SyncError::StoreUnavailable(format!("remote {} unreadable: {}", category, e))
        })?;
        snapshot.set(payload);
    }

    if seen == 0 {
        return Err(SyncError::StoreUnavailable(
            "fetch response carries no categories".to_string(),
        ));
    }

    snapshot.sort_history();
    Ok(snapshot)
}

impl RecordStore for HttpRecordStore {
    async fn fetch(&self, owner: &OwnerId) -> Result<UserSnapshot, SyncError> {
        let response = self
            .post(&WireRequest {
                user_id: owner.as_str(),
                data_type: ALL_CATEGORIES,
                data: None,
                action: "fetch",
            })
            .await?;
        parse_snapshot(response.data, response.fields)
    }

    async fn save(&self, owner: &OwnerId, payload: &CategoryPayload) -> Result<SaveSummary, SyncError> {
        payload.validate()?;
        let response = self
            .post(&WireRequest {
                user_id: owner.as_str(),
                data_type: payload.category().wire_name(),
                data: Some(payload.to_json()?),
                action: "save",
            })
            .await?;

        tracing::debug!(
            "Store saved {} for {}: {}",
            payload.category(),
            owner,
            response.message.as_deref().unwrap_or("ok")
        );

        Ok(SaveSummary {
            created_count: response.created_count.unwrap_or(0),
            updated_count: response.updated_count.unwrap_or(0),
        })
    }

    async fn reset(&self, owner: &OwnerId, scope: ResetScope) -> Result<ResetSummary, SyncError> {
        let categories = scope.categories();
        if categories.is_empty() {
            return Ok(ResetSummary::default());
        }

        let response = self
            .post(&WireRequest {
                user_id: owner.as_str(),
                data_type: scope.wire_name(),
                data: None,
                action: "reset",
            })
            .await?;

        Ok(ResetSummary {
            deleted_count: response.deleted_count.unwrap_or(0),
            categories,
        })
    }
}

/// Record store chosen from configuration.
pub enum ConfiguredStore {
    Http(HttpRecordStore),
    Memory(MemoryRecordStore),
}

impl ConfiguredStore {
    /// HTTP when a base URL is configured, otherwise in process.
    pub fn from_settings(settings: &StoreSettings) -> Result<Self, SyncError> {
        match &settings.base_url {
            Some(url) => Ok(ConfiguredStore::Http(HttpRecordStore::new(
                url.clone(),
                settings.api_key.clone(),
                Duration::from_secs(settings.timeout_secs),
            )?)),
            None => {
                tracing::info!("No record store configured; keeping records in process");
                Ok(ConfiguredStore::Memory(MemoryRecordStore::new()))
            }
        }
    }
}

impl RecordStore for ConfiguredStore {
    async fn fetch(&self, owner: &OwnerId) -> Result<UserSnapshot, SyncError> {
        match self {
            ConfiguredStore::Http(s) => s.fetch(owner).await,
            ConfiguredStore::Memory(s) => s.fetch(owner).await,
        }
    }

    async fn save(&self, owner: &OwnerId, payload: &CategoryPayload) -> Result<SaveSummary, SyncError> {
        match self {
            ConfiguredStore::Http(s) => s.save(owner, payload).await,
            ConfiguredStore::Memory(s) => s.save(owner, payload).await,
        }
    }

    async fn reset(&self, owner: &OwnerId, scope: ResetScope) -> Result<ResetSummary, SyncError> {
        match self {
            ConfiguredStore::Http(s) => s.reset(owner, scope).await,
            ConfiguredStore::Memory(s) => s.reset(owner, scope).await,
        }
    }
}

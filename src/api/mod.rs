//! Exposed surface: the data entry point, the gate check and the coach chat.
//!
//! Every call authenticates first. `Unauthorized` stops processing; every
//! other failure is turned into a response with an HTTP-like status.

pub mod identity;

pub use identity::{AuthRequest, IdentityProvider, StaticTokenIdentity};

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::coach::{ChatReply, Coach, ContentGenerator, Conversation, DraftFactory};
use crate::onboarding::{
    self, AnswerOption, GateDecision, GateReport, NavigationHints, QuestionnaireStep,
};
use crate::records::{Category, CategoryPayload, OwnerId, Preferences, RecordError};
use crate::session::SessionContext;
use crate::sync::{DataSource, ReconciliationEngine, RecordStore, ResetScope, RetryQueue, SyncError};

/// `dataType` value selecting every category on fetch.
pub const ALL_DATA: &str = "all";

/// Errors surfaced by the API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No valid owner; nothing else is processed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl ApiError {
    /// HTTP-equivalent status.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Unauthorized(_) => 401,
            ApiError::Record(e) => e.status_code(),
            ApiError::Sync(SyncError::Record(e)) => e.status_code(),
            ApiError::Sync(SyncError::NoOwner) => 401,
            ApiError::Sync(SyncError::StoreUnavailable(_)) => 503,
            ApiError::Sync(_) => 500,
        }
    }
}

/// Data operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataAction {
    Fetch,
    Save,
    Reset,
}

/// Body of the data entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRequest {
    pub action: DataAction,
    /// Must match the authenticated owner when present
    #[serde(default)]
    pub user_id: Option<String>,
    /// Category wire name, or `all`
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl DataRequest {
    pub fn fetch(data_type: Option<&str>) -> Self {
        Self {
            action: DataAction::Fetch,
            user_id: None,
            data_type: data_type.map(str::to_string),
            data: None,
        }
    }

    pub fn save(data_type: &str, data: Value) -> Self {
        Self {
            action: DataAction::Save,
            user_id: None,
            data_type: Some(data_type.to_string()),
            data: Some(data),
        }
    }

    pub fn reset(data_type: &str) -> Self {
        Self {
            action: DataAction::Reset,
            user_id: None,
            data_type: Some(data_type.to_string()),
            data: None,
        }
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    fn category(&self) -> Result<Category, RecordError> {
        self.data_type
            .as_deref()
            .ok_or_else(|| RecordError::MalformedPayload("dataType is required".to_string()))?
            .parse()
    }
}

/// Response of every entry point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataResponse {
    pub success: bool,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Degraded-mode notice; the call still succeeded locally
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl DataResponse {
    pub fn ok(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: true,
            status: 200,
            message: Some(message.into()),
            error: None,
            data,
            notice: None,
        }
    }

    pub fn failure(status: u16, error: impl Into<String>) -> Self {
        Self {
            success: false,
            status,
            message: None,
            error: Some(error.into()),
            data: None,
            notice: None,
        }
    }

    fn with_notice(mut self, notice: Option<&str>) -> Self {
        self.notice = notice.map(str::to_string);
        self
    }
}

impl From<ApiError> for DataResponse {
    fn from(err: ApiError) -> Self {
        DataResponse::failure(err.status_code(), err.to_string())
    }
}

/// Result of a gate check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateResponse {
    pub decision: GateDecision,
    pub reason: &'static str,
    pub source: DataSource,
    /// Plan data to render when allowed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<crate::records::UserSnapshot>,
}

impl From<GateReport> for GateResponse {
    fn from(report: GateReport) -> Self {
        let data = report.decision.is_allowed().then_some(report.snapshot);
        Self {
            reason: report.decision.rule.description(),
            decision: report.decision,
            source: report.source,
            data,
        }
    }
}

/// One questionnaire step as shown to the user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepView {
    pub step: QuestionnaireStep,
    pub title: &'static str,
    pub description: &'static str,
    pub options: &'static [AnswerOption],
    pub multi_select: bool,
    pub skippable: bool,
}

/// Every questionnaire step in order.
pub fn questionnaire() -> Vec<StepView> {
    QuestionnaireStep::all()
        .iter()
        .map(|step| StepView {
            step: *step,
            title: step.title(),
            description: step.description(),
            options: step.options(),
            multi_select: step.is_multi_select(),
            skippable: step.is_skippable(),
        })
        .collect()
}

/// One line of input to the binary.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub auth: AuthRequest,
    pub command: Command,
}

impl ApiRequest {
    /// Parse a JSON request. The bearer token travels as `token`.
    pub fn parse(line: &str) -> Result<Self, RecordError> {
        let value: Value = serde_json::from_str(line)?;
        let auth = AuthRequest {
            bearer: value.get("token").and_then(Value::as_str).map(str::to_string),
        };
        let command = serde_json::from_value(value)?;
        Ok(Self { auth, command })
    }
}

/// Commands accepted by [`Api::dispatch`], tagged by `action`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    #[serde(rename_all = "camelCase")]
    Fetch {
        #[serde(default)]
        user_id: Option<String>,
        #[serde(default)]
        data_type: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Save {
        #[serde(default)]
        user_id: Option<String>,
        data_type: String,
        data: Value,
    },
    #[serde(rename_all = "camelCase")]
    Reset {
        #[serde(default)]
        user_id: Option<String>,
        data_type: String,
    },
    #[serde(rename_all = "camelCase")]
    Gate {
        #[serde(default)]
        came_from_onboarding_flow: bool,
        #[serde(default)]
        explicit_bypass: bool,
    },
    Chat { text: String },
    CompleteOnboarding { preferences: Preferences },
    ResetOnboarding,
    Questionnaire,
    /// Retry queued writes now
    Sync,
}

/// API service over one engine, generator and identity provider.
pub struct Api<S, Q, G, I = StaticTokenIdentity> {
    engine: Arc<ReconciliationEngine<S, Q>>,
    factory: DraftFactory<G>,
    identity: I,
    conversations: Mutex<HashMap<OwnerId, Conversation>>,
}

impl<S, Q, G, I> Api<S, Q, G, I>
where
    S: RecordStore,
    Q: RetryQueue,
    G: ContentGenerator,
    I: IdentityProvider,
{
    pub fn new(engine: Arc<ReconciliationEngine<S, Q>>, factory: DraftFactory<G>, identity: I) -> Self {
        Self {
            engine,
            factory,
            identity,
            conversations: Mutex::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &Arc<ReconciliationEngine<S, Q>> {
        &self.engine
    }

    fn authorize(&self, auth: &AuthRequest, user_id: Option<&str>) -> Result<SessionContext, ApiError> {
        let owner = self.identity.authenticate(auth)?;
        if let Some(claimed) = user_id {
            if claimed != owner.as_str() {
                tracing::warn!("Request for {} rejected for owner {}", claimed, owner);
                return Err(ApiError::Unauthorized(
                    "userId does not match the authenticated owner".to_string(),
                ));
            }
        }
        Ok(SessionContext::for_owner(owner))
    }

    /// Save, fetch or reset data for the authenticated owner.
    pub async fn handle(&self, auth: &AuthRequest, request: DataRequest) -> DataResponse {
        match self.try_handle(auth, request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Data request failed: {}", e);
                e.into()
            }
        }
    }

    async fn try_handle(&self, auth: &AuthRequest, request: DataRequest) -> Result<DataResponse, ApiError> {
        let ctx = self.authorize(auth, request.user_id.as_deref())?;

        match request.action {
            DataAction::Fetch => {
                let load = self.engine.load(&ctx).await?;
                let data = match request.data_type.as_deref() {
                    None | Some(ALL_DATA) => serde_json::to_value(&load.snapshot)
                        .map_err(RecordError::from)?,
                    Some(tag) => {
                        let category: Category = tag.parse()?;
                        match load.snapshot.get(category) {
                            Some(payload) => payload.to_json()?,
                            None => Value::Null,
                        }
                    }
                };
                let notice = load.source.may_be_stale().then(|| load.source.description());
                Ok(DataResponse::ok("Data retrieved", Some(data)).with_notice(notice))
            }

            DataAction::Save => {
                let category = request.category()?;
                let data = request
                    .data
                    .ok_or_else(|| RecordError::MalformedPayload("data is required".to_string()))?;
                let payload = CategoryPayload::from_json(category, data)?;
                let report = self.engine.save(&ctx, payload).await?;
                let notice = report.remote.notice();
                Ok(DataResponse::ok(
                    format!("Saved {}", category.display_name()),
                    Some(serde_json::to_value(&report).map_err(RecordError::from)?),
                )
                .with_notice(notice))
            }

            DataAction::Reset => {
                let scope = ResetScope::parse(request.data_type.as_deref().unwrap_or_default())?;
                let report = self.engine.reset(&ctx, scope).await?;
                if report.refused {
                    return Ok(DataResponse::failure(400, "History is kept and cannot be reset"));
                }
                let notice = report.remote.as_ref().and_then(|s| s.notice());
                Ok(DataResponse::ok(
                    format!("Reset {}", scope.wire_name()),
                    Some(serde_json::to_value(&report).map_err(RecordError::from)?),
                )
                .with_notice(notice))
            }
        }
    }

    /// Decide whether the plan view may be shown.
    pub async fn check_gate(
        &self,
        auth: &AuthRequest,
        hints: NavigationHints,
    ) -> Result<GateResponse, ApiError> {
        let ctx = self.authorize(auth, None)?;
        let report = onboarding::evaluate_gate(&*self.engine, &ctx, hints).await?;
        Ok(report.into())
    }

    /// Run one chat turn in the owner's conversation.
    pub async fn chat(&self, auth: &AuthRequest, text: &str) -> Result<ChatReply, ApiError> {
        let ctx = self.authorize(auth, None)?;
        let Some(owner) = ctx.owner().cloned() else {
            return Err(SyncError::NoOwner.into());
        };

        let mut conversations = self.conversations.lock().await;
        let conversation = conversations.entry(owner).or_default();
        let coach = Coach::new(&*self.engine, &self.factory);
        Ok(coach.respond(&ctx, conversation, text).await?)
    }

    /// Save questionnaire answers and an initial plan.
    pub async fn complete_onboarding(
        &self,
        auth: &AuthRequest,
        preferences: Preferences,
    ) -> Result<onboarding::OnboardingOutcome, ApiError> {
        let ctx = self.authorize(auth, None)?;
        Ok(onboarding::complete_onboarding(&*self.engine, &self.factory, &ctx, preferences).await?)
    }

    /// Clear plans and preferences so onboarding runs again.
    pub async fn reset_onboarding(&self, auth: &AuthRequest) -> Result<DataResponse, ApiError> {
        let ctx = self.authorize(auth, None)?;
        let report = onboarding::reset_for_reonboarding(&*self.engine, &ctx).await?;
        if let Some(owner) = ctx.owner() {
            self.conversations.lock().await.remove(owner);
        }
        let notice = report.remote.as_ref().and_then(|s| s.notice());
        Ok(DataResponse::ok(
            "Onboarding reset",
            Some(serde_json::to_value(&report).map_err(RecordError::from)?),
        )
        .with_notice(notice))
    }

    /// Route one parsed request.
    pub async fn dispatch(&self, request: ApiRequest) -> DataResponse {
        let auth = &request.auth;
        let result = match request.command {
            Command::Fetch { user_id, data_type } => {
                let mut data = DataRequest::fetch(data_type.as_deref());
                data.user_id = user_id;
                return self.handle(auth, data).await;
            }
            Command::Save {
                user_id,
                data_type,
                data,
            } => {
                let mut data = DataRequest::save(&data_type, data);
                data.user_id = user_id;
                return self.handle(auth, data).await;
            }
            Command::Reset { user_id, data_type } => {
                let mut data = DataRequest::reset(&data_type);
                data.user_id = user_id;
                return self.handle(auth, data).await;
            }
            Command::Gate {
                came_from_onboarding_flow,
                explicit_bypass,
            } => {
                let hints = NavigationHints {
                    came_from_onboarding_flow,
                    explicit_bypass,
                };
                self.check_gate(auth, hints)
                    .await
                    .and_then(|gate| respond("Gate evaluated", &gate))
            }
            Command::Chat { text } => self
                .chat(auth, &text)
                .await
                .and_then(|reply| {
                    let notice = reply.notice.clone();
                    respond("Chat reply", &reply).map(|r| DataResponse { notice, ..r })
                }),
            Command::CompleteOnboarding { preferences } => self
                .complete_onboarding(auth, preferences)
                .await
                .and_then(|outcome| {
                    let notice = outcome.plan.remote.notice();
                    respond("Onboarding complete", &outcome).map(|r| r.with_notice(notice))
                }),
            Command::ResetOnboarding => self.reset_onboarding(auth).await,
            Command::Questionnaire => respond("Questionnaire", &questionnaire()),
            Command::Sync => match self.authorize(auth, None) {
                Ok(ctx) => match ctx.owner() {
                    Some(owner) => match self.engine.flush(owner, true).await {
                        Ok(report) => respond("Sync attempted", &report),
                        Err(e) => Err(e.into()),
                    },
                    None => Err(SyncError::NoOwner.into()),
                },
                Err(e) => Err(e),
            },
        };
        result.unwrap_or_else(DataResponse::from)
    }
}

fn respond<T: Serialize>(message: &str, value: &T) -> Result<DataResponse, ApiError> {
    let data = serde_json::to_value(value).map_err(RecordError::from)?;
    Ok(DataResponse::ok(message, Some(data)))
}

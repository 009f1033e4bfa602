//! Content generation for drafts.
//!
//! The generator is an external collaborator. Whatever it returns is
//! validated, and any failure, timeout or malformed result is replaced by a
//! template so the user always gets a draft.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use super::fallback::fallback_for;
use super::intent;
use super::{Draft, DraftClass, DraftContent, DraftSource};
use crate::records::{DietPlan, DietType, Preferences, Workout, WorkoutType};
use crate::storage::config::GeneratorSettings;

/// Default bound on one generation call.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(15);

/// Error types for content generation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("Generation failed: {0}")]
    Failed(String),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    /// Response did not have the required structure
    #[error("Malformed generation result: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for GenerationError {
    fn from(err: serde_json::Error) -> Self {
        GenerationError::Malformed(err.to_string())
    }
}

/// What to generate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub class: DraftClass,
    /// User's own words
    pub text: String,
    pub workout_type: Option<WorkoutType>,
    pub diet_type: Option<DietType>,
    pub focus_area: Option<String>,
    pub difficulty: Option<String>,
    #[serde(default)]
    pub restrictions: Vec<String>,
}

impl GenerationRequest {
    /// Build a request, reading type, focus and intensity from `text`.
    pub fn new(class: DraftClass, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            class,
            workout_type: intent::detect_workout_type(&text),
            diet_type: intent::detect_diet_type(&text),
            focus_area: intent::detect_focus_area(&text).map(str::to_string),
            difficulty: intent::detect_intensity(&text).map(str::to_string),
            restrictions: Vec::new(),
            text,
        }
    }

    pub fn with_restrictions(mut self, restrictions: Vec<String>) -> Self {
        self.restrictions = restrictions;
        self
    }

    pub fn with_workout_type(mut self, workout_type: WorkoutType) -> Self {
        self.workout_type = Some(workout_type);
        self
    }

    /// Fill gaps from questionnaire answers.
    pub fn with_preferences(mut self, preferences: &Preferences) -> Self {
        if self.difficulty.is_none() {
            self.difficulty = preferences.experience_level.as_deref().map(capitalize);
        }
        for limitation in &preferences.limitations {
            if limitation != "none" && !self.restrictions.contains(limitation) {
                self.restrictions.push(limitation.clone());
            }
        }
        self
    }

    /// Full prompt sent to the generator.
    pub fn prompt(&self) -> String {
        let mut prompt = intent::enrich_prompt(self.class, &self.text, &self.restrictions);
        if let Some(t) = self.workout_type.filter(|_| self.class == DraftClass::Workout) {
            prompt.push_str(&format!("\nWorkout type: {}.", t));
        }
        prompt
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Produces structured draft content from a request.
pub trait ContentGenerator: Send + Sync {
    fn generate(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<DraftContent, GenerationError>> + Send;

    /// Source recorded on drafts this generator produces.
    fn source(&self) -> DraftSource {
        DraftSource::Generated
    }
}

/// Check that content has the minimum required fields.
pub fn validate(content: &DraftContent) -> Result<(), GenerationError> {
    if content.title().trim().is_empty() {
        return Err(GenerationError::Malformed("missing title".to_string()));
    }
    match content {
        DraftContent::Workout(w) if w.exercises.is_empty() => {
            Err(GenerationError::Malformed("workout has no exercises".to_string()))
        }
        DraftContent::Diet(d) if d.meals.is_empty() => {
            Err(GenerationError::Malformed("diet plan has no meals".to_string()))
        }
        _ => Ok(()),
    }
}

const WORKOUT_SYSTEM_PROMPT: &str = "You are an expert fitness coach. Reply with ONLY a JSON object \
of the form {\"title\": string, \"description\": string, \"workoutType\": \"strength\"|\"hiit\"|\"yoga\"|\"core\", \
\"difficulty\": string, \"duration\": string, \"exercises\": [string]} with 5-7 exercises.";

const DIET_SYSTEM_PROMPT: &str = "You are an expert nutrition coach. Reply with ONLY a JSON object \
of the form {\"title\": string, \"description\": string, \"dietType\": \"balanced\"|\"keto\"|\"vegan\"|\"paleo\"|\"intermittent\", \
\"calorieRange\": string, \"meals\": [{\"mealType\": \"breakfast\"|\"lunch\"|\"dinner\"|\"snack\", \
\"title\": string, \"description\": string, \"ingredients\": [string]}]}.";

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct ChatCompletionsGenerator {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: String,
}

impl ChatCompletionsGenerator {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Failed(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 1000,
        })
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    fn body(&self, request: &GenerationRequest) -> Value {
        let system = match request.class {
            DraftClass::Workout => WORKOUT_SYSTEM_PROMPT,
            DraftClass::Diet => DIET_SYSTEM_PROMPT,
        };
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": request.prompt()},
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

/// Parse the assistant message into draft content.
///
/// Tolerates a Markdown code fence around the JSON document.
pub fn parse_content(class: DraftClass, raw: &str) -> Result<DraftContent, GenerationError> {
    let trimmed = raw.trim();
    let json = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => return Err(GenerationError::Malformed("no JSON object in reply".to_string())),
    };

    let content = match class {
        DraftClass::Workout => DraftContent::Workout(serde_json::from_str::<Workout>(json)?),
        DraftClass::Diet => DraftContent::Diet(serde_json::from_str::<DietPlan>(json)?),
    };
    validate(&content)?;
    Ok(content)
}

impl ContentGenerator for ChatCompletionsGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<DraftContent, GenerationError> {
        let mut builder = self.http.post(&self.endpoint).json(&self.body(request));
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout(Duration::ZERO)
            } else {
                GenerationError::Failed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GenerationError::Failed(format!(
                "generator returned status {}",
                status
            )));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Malformed(e.to_string()))?;
        let raw = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| GenerationError::Malformed("no choices".to_string()))?;

        parse_content(request.class, &raw)
    }
}

/// Generator that only uses built-in templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateGenerator;

impl ContentGenerator for TemplateGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<DraftContent, GenerationError> {
        Ok(fallback_for(request))
    }

    fn source(&self) -> DraftSource {
        DraftSource::Fallback
    }
}

/// Generator chosen from configuration.
pub enum ConfiguredGenerator {
    Remote(ChatCompletionsGenerator),
    Template(TemplateGenerator),
}

impl ConfiguredGenerator {
    pub fn from_settings(settings: &GeneratorSettings) -> Result<Self, GenerationError> {
        match &settings.base_url {
            Some(base_url) => {
                let generator = ChatCompletionsGenerator::new(
                    base_url,
                    settings.api_key.clone(),
                    settings.model.clone(),
                    Duration::from_secs(settings.timeout_secs),
                )?
                .with_sampling(settings.temperature, settings.max_tokens);
                Ok(ConfiguredGenerator::Remote(generator))
            }
            None => Ok(ConfiguredGenerator::Template(TemplateGenerator)),
        }
    }
}

impl ContentGenerator for ConfiguredGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<DraftContent, GenerationError> {
        match self {
            ConfiguredGenerator::Remote(g) => g.generate(request).await,
            ConfiguredGenerator::Template(g) => g.generate(request).await,
        }
    }

    fn source(&self) -> DraftSource {
        match self {
            ConfiguredGenerator::Remote(g) => g.source(),
            ConfiguredGenerator::Template(g) => g.source(),
        }
    }
}

/// Turns requests into drafts, never failing.
pub struct DraftFactory<G> {
    generator: G,
    timeout: Duration,
}

impl<G: ContentGenerator> DraftFactory<G> {
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Produce exactly one draft for `request`.
    ///
    /// Every draft gets a fresh item id so committing it never collides with
    /// a stored item.
    pub async fn draft(&self, request: &GenerationRequest) -> Draft {
        let result = match tokio::time::timeout(self.timeout, self.generator.generate(request)).await
        {
            Ok(result) => result.and_then(|content| {
                validate(&content)?;
                Ok(content)
            }),
            Err(_) => Err(GenerationError::Timeout(self.timeout)),
        };

        let (content, source) = match result {
            Ok(content) => (content, self.generator.source()),
            Err(e) => {
                tracing::warn!("Using template {} after generator error: {}", request.class, e);
                (fallback_for(request), DraftSource::Fallback)
            }
        };

        Draft::new(content.with_new_id(), source, request.restrictions.clone())
    }
}

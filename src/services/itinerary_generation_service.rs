use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{AppConfig, LlmProvider};
use crate::error::ApiError;
use crate::models::suggestion::ItineraryResult;
use crate::models::trip::{coerce_budget, coerce_preferences, PastTrip};
use crate::services::{http_client, normalizer};

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const GENERATION_TEMPERATURE: f32 = 0.3;

/// Parameters for one generation call, already validated.
#[derive(Debug, Clone, PartialEq)]
pub struct TripRequest {
    pub city: String,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    pub preferences: Vec<String>,
    pub budget: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTripRequest {
    pub city: Option<String>,
    #[serde(alias = "checkin")]
    pub check_in: Option<String>,
    #[serde(alias = "checkout")]
    pub check_out: Option<String>,
    #[serde(alias = "preferences")]
    pub preference: Option<Value>,
    pub budget: Option<Value>,
}

fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// An absent, null or blank budget leaves the plan open; anything else must be a positive number.
fn optional_budget(raw: Option<&Value>) -> Result<Option<f64>, ApiError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(value) => coerce_budget(Some(value))
            .filter(|b| *b > 0.0)
            .map(Some)
            .ok_or_else(|| ApiError::validation("budget must be a positive number")),
    }
}

impl TryFrom<GenerateTripRequest> for TripRequest {
    type Error = ApiError;

    fn try_from(body: GenerateTripRequest) -> Result<Self, Self::Error> {
        let city = non_blank(body.city).ok_or_else(|| ApiError::validation("city is required"))?;
        let budget = optional_budget(body.budget.as_ref())?;

        Ok(TripRequest {
            city,
            check_in: non_blank(body.check_in),
            check_out: non_blank(body.check_out),
            preferences: coerce_preferences(body.preference.as_ref()),
            budget,
        })
    }
}

fn budget_text(budget: f64) -> String {
    if budget.fract() == 0.0 {
        format!("{}", budget as i64)
    } else {
        budget.to_string()
    }
}

pub fn build_prompt(req: &TripRequest) -> String {
    let preference_text = if req.preferences.is_empty() {
        "a mix of experiences".to_string()
    } else {
        req.preferences.join(", ")
    };

    let days_text = match (&req.check_in, &req.check_out) {
        (Some(check_in), Some(check_out)) => format!("from {} to {}", check_in, check_out),
        _ => "for 5 days".to_string(),
    };

    let budget_line = match req.budget {
        Some(budget) => format!("The total budget is ₹{}.", budget_text(budget)),
        None => "The budget is flexible; keep costs reasonable.".to_string(),
    };

    format!(
        "You are a smart travel planner.
Plan a budget-friendly trip to {city} {days} for a traveler who prefers {prefs}.
{budget_line}

Reply in valid JSON with these keys only: hotels, meals, itinerary, estimatedTotal, packingList.
- hotels: array of at least 3 hotels (name, type, location, totalCost, features[])
- meals: for breakfast, lunch, dinner (cuisineType, famousDish, minCost, recommendedRestaurants[])
- itinerary: day-wise plan with date labels, each place/activity with minTransportCost
- estimatedTotal: object with breakdown and total
- packingList: array of items based on weather
No extra text, no markdown, just the JSON object as response.",
        city = req.city,
        days = days_text,
        prefs = preference_text,
        budget_line = budget_line,
    )
}

pub fn build_refine_prompt(trip: &PastTrip, request: &str) -> String {
    let current = serde_json::to_string(&trip.suggestions_json()).unwrap_or_default();
    let prefs = if trip.preference.is_empty() {
        "a mix of experiences".to_string()
    } else {
        trip.preference.join(", ")
    };

    format!(
        "You are a smart travel planner refining an existing plan.
The trip is to {city} from {check_in} to {check_out} for a traveler who prefers {prefs}.
The total budget is ₹{budget}.

Current plan (JSON):
{current}

The traveler asks: {request}

Return the complete updated plan as valid JSON using the same keys as the current plan.
No extra text, no markdown, just the JSON object as response.",
        city = trip.city,
        check_in = trip.check_in,
        check_out = trip.check_out,
        prefs = prefs,
        budget = budget_text(trip.budget),
        current = current,
        request = request.trim(),
    )
}

/// Pulls a JSON value out of model output: the whole text, the text with
/// markdown fences removed, or the first balanced `{...}` block.
pub fn parse_model_json(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(v) = serde_json::from_str::<Value>(text) {
        return Some(v);
    }

    let stripped = text.replace("```json", "").replace("```", "");
    if let Ok(v) = serde_json::from_str::<Value>(stripped.trim()) {
        return Some(v);
    }

    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let candidate = &text[start..=start + i];
                    return serde_json::from_str::<Value>(candidate).ok();
                }
            }
            _ => {}
        }
    }
    None
}

/// Classifies model output. Unparseable text is kept rather than rejected.
pub fn interpret_reply(text: &str) -> ItineraryResult {
    match parse_model_json(text) {
        Some(suggestions) if suggestions.is_object() || suggestions.is_array() => {
            let sections = normalizer::to_sections(&suggestions);
            ItineraryResult::Structured {
                suggestions,
                sections,
            }
        }
        _ => {
            log::warn!("Model reply was not JSON; returning raw text");
            ItineraryResult::Raw {
                text: text.to_string(),
            }
        }
    }
}

#[async_trait]
pub trait ItineraryGenerator: Send + Sync {
    /// Sends one prompt and returns the model's text reply.
    async fn complete(&self, prompt: &str) -> Result<String, ApiError>;

    fn provider_name(&self) -> &'static str;
}

pub async fn generate_itinerary(
    generator: &dyn ItineraryGenerator,
    req: &TripRequest,
) -> Result<ItineraryResult, ApiError> {
    log::info!(
        "Generating itinerary for {} via {}",
        req.city,
        generator.provider_name()
    );
    let reply = generator.complete(&build_prompt(req)).await?;
    Ok(interpret_reply(&reply))
}

pub async fn refine_itinerary(
    generator: &dyn ItineraryGenerator,
    trip: &PastTrip,
    request: &str,
) -> Result<ItineraryResult, ApiError> {
    log::info!(
        "Refining trip to {} via {}",
        trip.city,
        generator.provider_name()
    );
    let reply = generator.complete(&build_refine_prompt(trip, request)).await?;
    Ok(interpret_reply(&reply))
}

pub fn build_generator(config: &AppConfig) -> Arc<dyn ItineraryGenerator> {
    match config.llm_provider {
        LlmProvider::Vertex => Arc::new(VertexAiGenerator::new(config)),
        LlmProvider::OpenRouter => Arc::new(OpenRouterGenerator::new(config)),
    }
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    temperature: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

pub struct VertexAiGenerator {
    client: reqwest::Client,
    project_id: Option<String>,
    location: String,
    model: String,
    access_token: Option<String>,
}

impl VertexAiGenerator {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: http_client(config.llm_timeout),
            project_id: config.vertex.project_id.clone(),
            location: config.vertex.location.clone(),
            model: config.vertex.model.clone(),
            access_token: config.vertex.access_token.clone(),
        }
    }

    fn endpoint(&self, project_id: &str) -> String {
        format!(
            "https://{loc}-aiplatform.googleapis.com/v1/projects/{project}/locations/{loc}/publishers/google/models/{model}:generateContent",
            loc = self.location,
            project = project_id,
            model = self.model
        )
    }
}

#[async_trait]
impl ItineraryGenerator for VertexAiGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, ApiError> {
        let project_id = self
            .project_id
            .as_deref()
            .ok_or_else(|| ApiError::Internal("GOOGLE_CLOUD_PROJECT_ID not set".to_string()))?;
        let access_token = self
            .access_token
            .as_deref()
            .ok_or_else(|| ApiError::Internal("GOOGLE_CLOUD_ACCESS_TOKEN not set".to_string()))?;

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                temperature: GENERATION_TEMPERATURE,
            },
        };

        let response = self
            .client
            .post(self.endpoint(project_id))
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::from_upstream("Vertex AI", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("Vertex AI returned {}: {}", status, error_text);
            return Err(ApiError::Upstream(format!(
                "Vertex AI request failed with status {}",
                status
            )));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("Failed to parse Vertex AI response: {}", e)))?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            Ok("{}".to_string())
        } else {
            Ok(text)
        }
    }

    fn provider_name(&self) -> &'static str {
        "vertex"
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

pub struct OpenRouterGenerator {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
}

impl OpenRouterGenerator {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: http_client(config.llm_timeout),
            api_key: config.openrouter.api_key.clone(),
            model: config.openrouter.model.clone(),
        }
    }
}

#[async_trait]
impl ItineraryGenerator for OpenRouterGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, ApiError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ApiError::Internal("OPENROUTER_API_KEY not set".to_string()))?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            response_format: ResponseFormat {
                kind: "json_object",
            },
            temperature: GENERATION_TEMPERATURE,
        };

        let response = self
            .client
            .post(OPENROUTER_URL)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::from_upstream("OpenRouter", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("OpenRouter returned {}: {}", status, error_text);
            return Err(ApiError::Upstream(format!(
                "OpenRouter request failed with status {}",
                status
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Upstream(format!("Failed to parse OpenRouter response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ApiError::Upstream("OpenRouter returned an empty reply".to_string()))
    }

    fn provider_name(&self) -> &'static str {
        "openrouter"
    }
}

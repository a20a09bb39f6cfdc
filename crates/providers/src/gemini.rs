//! Google Gemini provider (`generateContent`, single-shot).
//!
//! Gemini differs from the OpenAI shape in a few ways handled here:
//! - The system turn travels as `systemInstruction`, not as a message
//! - Assistant turns use the `model` role
//! - Tool calls are `functionCall` parts, results are `functionResponse` parts
//! - Schema types are upper-case (`OBJECT`, `NUMBER`, `STRING`)
//! - Calls carry no id, so one is synthesised per call

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use staybot_core::error::ProviderError;
use staybot_core::message::{Role, Turn, TurnToolCall};
use staybot_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use staybot_core::tool::ToolDefinition;
use std::time::Duration;
use tracing::debug;

use crate::http::{check_status, network};
use crate::transcript::{answered_call_ids, answered_calls};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini `generateContent` provider.
pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        self
    }

    fn request_body(request: &ProviderRequest) -> GeminiRequest {
        let answered = answered_call_ids(&request.turns);

        let system_instruction = request
            .turns
            .iter()
            .find(|t| t.role == Role::System)
            .map(|t| GeminiContent {
                role: None,
                parts: vec![GeminiPart::text(t.text())],
            });

        let mut contents: Vec<GeminiContent> = Vec::new();
        for turn in &request.turns {
            match turn.role {
                Role::System => {}
                Role::User => contents.push(GeminiContent {
                    role: Some("user".into()),
                    parts: vec![GeminiPart::text(turn.text())],
                }),
                Role::Assistant => {
                    let mut parts = Vec::new();
                    if !turn.text().is_empty() {
                        parts.push(GeminiPart::text(turn.text()));
                    }
                    for call in answered_calls(turn, &answered) {
                        parts.push(GeminiPart {
                            function_call: Some(GeminiFunctionCall {
                                name: call.name.clone(),
                                args: serde_json::from_str(&call.arguments)
                                    .unwrap_or_else(|_| serde_json::json!({})),
                            }),
                            ..GeminiPart::default()
                        });
                    }
                    if parts.is_empty() {
                        parts.push(GeminiPart::text(""));
                    }
                    contents.push(GeminiContent {
                        role: Some("model".into()),
                        parts,
                    });
                }
                Role::Tool => {
                    let part = GeminiPart {
                        function_response: Some(GeminiFunctionResponse {
                            name: turn.tool_name.clone().unwrap_or_default(),
                            response: serde_json::json!({ "content": turn.text() }),
                        }),
                        ..GeminiPart::default()
                    };
                    // Results of one batch of calls go back as a single content.
                    match contents.last_mut() {
                        Some(last)
                            if last.role.as_deref() == Some("user")
                                && last.parts.iter().all(|p| p.function_response.is_some()) =>
                        {
                            last.parts.push(part)
                        }
                        _ => contents.push(GeminiContent {
                            role: Some("user".into()),
                            parts: vec![part],
                        }),
                    }
                }
            }
        }

        let tools = if request.tools.is_empty() {
            Vec::new()
        } else {
            vec![GeminiTools {
                function_declarations: request.tools.iter().map(Self::declaration).collect(),
            }]
        };

        GeminiRequest {
            system_instruction,
            contents,
            tools,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }

    fn declaration(tool: &ToolDefinition) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = tool
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    serde_json::json!({
                        "type": p.kind.json_type().to_ascii_uppercase(),
                        "description": p.description,
                    }),
                )
            })
            .collect();
        let required: Vec<&str> = tool
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        serde_json::json!({
            "name": tool.name,
            "description": tool.description,
            "parameters": {
                "type": "OBJECT",
                "properties": properties,
                "required": required,
            }
        })
    }

    fn parse_response(
        response: GeminiResponse,
        model: &str,
    ) -> Result<ProviderResponse, ProviderError> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No candidates in response".into()))?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(call) = part.function_call {
                let id = format!("call_{}", uuid::Uuid::new_v4().simple());
                tool_calls.push(TurnToolCall::new(id, call.name, call.args.to_string()));
            }
        }

        let message = if tool_calls.is_empty() {
            Turn::assistant(text)
        } else {
            Turn::assistant_tool_calls(text, tool_calls)
        };

        let usage = response.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(ProviderResponse {
            message,
            usage,
            model: response.model_version.unwrap_or_else(|| model.to_string()),
        })
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let body = Self::request_body(&request);
        debug!(provider = "gemini", model = %request.model, turns = request.turns.len(), "Sending generateContent request");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(network)?;
        let response = check_status(response, "gemini").await?;

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        Self::parse_response(parsed, &request.model)
    }
}

// --- Gemini API types (internal) ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTools>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTools {
    function_declarations: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<GeminiFunctionResponse>,
}

impl GeminiPart {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsage>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

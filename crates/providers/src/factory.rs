//! Build the configured provider.
//!
//! The backend is chosen once at startup; the engine only ever sees
//! `Arc<dyn Provider>`.

use staybot_config::{ProviderConfig, ProviderKind};
use staybot_core::error::ProviderError;
use staybot_core::provider::Provider;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::gemini::GeminiProvider;
use crate::openai::{self, OpenAiProvider};

/// Build a provider from configuration.
pub fn build_from_config(config: &ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            ProviderError::AuthenticationFailed(format!(
                "no API key configured: set STAYBOT_API_KEY or {}",
                config.kind.api_key_env()
            ))
        })?;
    let timeout = Duration::from_secs(config.timeout_secs);

    let provider: Arc<dyn Provider> = match config.kind {
        ProviderKind::OpenAi => {
            let base_url = config.api_url.as_deref().unwrap_or(openai::DEFAULT_BASE_URL);
            Arc::new(
                OpenAiProvider::new(base_url, api_key)
                    .with_streaming(config.streaming)
                    .with_timeout(timeout),
            )
        }
        ProviderKind::Gemini => {
            let mut p = GeminiProvider::new(api_key).with_timeout(timeout);
            if let Some(url) = &config.api_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
    };

    info!(
        provider = provider.name(),
        model = %config.model_name(),
        streaming = provider.is_streaming(),
        "Provider ready"
    );
    Ok(provider)
}

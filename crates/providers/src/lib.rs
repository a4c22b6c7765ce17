//! LLM provider implementations for refchat.
//!
//! All providers implement the `refchat_core::Provider` trait.

pub mod gemini;

pub use gemini::GeminiProvider;

use refchat_config::AppConfig;
use std::sync::Arc;
use std::time::Duration;

/// Build the configured provider.
///
/// A missing API key is a configuration error for the whole run.
pub fn build_from_config(
    config: &AppConfig,
) -> Result<Arc<dyn refchat_core::Provider>, refchat_core::Error> {
    let api_key = config.require_api_key()?;
    let timeout = Duration::from_secs(config.provider.request_timeout_secs);

    let mut provider = GeminiProvider::new(api_key, timeout)
        .map_err(|e| refchat_core::Error::config(e.to_string()))?;
    if let Some(url) = &config.provider.api_url {
        provider = provider.with_base_url(url.as_str());
    }

    tracing::debug!(model = %config.model, "Gemini provider ready");
    Ok(Arc::new(provider))
}

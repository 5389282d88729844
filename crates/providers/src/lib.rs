//! Chat-completion provider for yugent.
//!
//! A single OpenAI-compatible implementation, parameterized by an
//! [`EndpointProfile`], covers every supported backend.

pub mod openai_compat;
pub mod profile;

use std::time::Duration;

use yugent_config::AppConfig;
use yugent_core::error::ProviderError;

pub use openai_compat::OpenAiCompatProvider;
pub use profile::{Credential, EndpointProfile, PRESETS};

/// Build the provider described by the configuration.
pub fn build_from_config(config: &AppConfig) -> Result<OpenAiCompatProvider, ProviderError> {
    let mut profile = match config.provider.as_str() {
        "custom" => {
            let base_url = config.base_url.clone().ok_or_else(|| {
                ProviderError::NotConfigured("provider 'custom' requires base_url".into())
            })?;
            EndpointProfile::custom(
                "custom",
                base_url,
                "/v1/chat/completions",
                Credential::Env("YUGENT_API_KEY".into()),
            )
        }
        name => EndpointProfile::preset(name)
            .ok_or_else(|| ProviderError::NotConfigured(format!("unknown provider '{name}'")))?,
    };

    if let Some(base_url) = &config.base_url {
        profile.base_url = base_url.clone();
    }
    if let Some(path) = &config.completions_path {
        profile.completions_path = path.clone();
    }
    if let Some(key) = &config.api_key {
        profile.credential = Credential::Static(key.clone());
    } else if let Some(var) = &config.api_key_env {
        profile.credential = Credential::Env(var.clone());
    }

    tracing::debug!(provider = %profile.name, url = %profile.url(), "Configured provider");
    OpenAiCompatProvider::with_connect_timeout(
        profile,
        Duration::from_secs(config.connect_timeout_secs),
    )
}

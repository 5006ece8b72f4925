use anyhow::Result;
use std::future::Future;
use std::pin::Pin;

mod openai;
mod retry;

pub use openai::OpenAI;

pub type ProviderFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// A text-reasoning capability: prompt in, completion text out.
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    fn complete<'a>(&'a self, prompt: String) -> ProviderFuture<'a>;
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub key: String,
    pub base_url: String,
    pub model: String,
}

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-chat";

pub fn build_provider(config: ProviderConfig) -> OpenAI {
    OpenAI::new(config.key)
        .with_base_url(config.base_url)
        .with_model(config.model)
}

pub(crate) fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

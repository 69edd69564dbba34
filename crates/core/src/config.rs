use crate::error::ConfigError;
use std::time::Duration;

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
pub struct SearchSettings {
    pub max_results: usize,
    pub text_boost: f64,
    pub num_candidates: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_results: 5,
            text_boost: 3.0,
            num_candidates: 10_000,
        }
    }
}

impl SearchSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let text_boost = parsed_var("ELASTICSEARCH_SEARCH_BOOST", 3.0)?;
        let max_results = parsed_var("ELASTICSEARCH_MAX_SEARCH_RESULTS", 5)?;

        Ok(Self {
            max_results,
            text_boost,
            ..Self::default()
        })
    }
}

#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = required_var("OPENAI_API_KEY")?;
        let endpoint = optional_var("OPENAI_BASE_URL")
            .unwrap_or_else(|| "https://api.openai.com".to_string());
        let model =
            optional_var("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
        let temperature = parsed_var("OPENAI_TEMPERATURE", 0.2)?;
        let max_tokens = parsed_var("OPENAI_MAX_TOKENS", 500)?;

        Ok(Self {
            endpoint,
            api_key,
            model,
            temperature,
            max_tokens,
        })
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingApiConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
}

impl EmbeddingApiConfig {
    pub fn from_env() -> Option<Self> {
        let endpoint = optional_var("EMBEDDINGS_ENDPOINT")?;
        let api_key = optional_var("EMBEDDINGS_API_KEY");
        let model = optional_var("EMBEDDINGS_MODEL")
            .unwrap_or_else(|| "all-mpnet-base-v2".to_string());

        Some(Self {
            endpoint,
            api_key,
            model,
        })
    }
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    optional_var(name).ok_or(ConfigError::MissingVar(name))
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

fn parsed_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match optional_var(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|error: T::Err| ConfigError::InvalidVar {
            name,
            details: error.to_string(),
        }),
    }
}

use crate::config::{EmbeddingApiConfig, HTTP_TIMEOUT};
use crate::error::SearchError;
use serde::{Deserialize, Serialize};

pub const EMBEDDING_DIMENSIONS: usize = 768;

pub trait Embedder {
    fn dimensions(&self) -> usize;
    fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError>;
}

#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    pub dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self {
            dimensions: EMBEDDING_DIMENSIONS,
        }
    }
}

impl Embedder for HashingEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return Ok(vector);
        }

        for window in chars.windows(3) {
            let trigram = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in trigram.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        Ok(vector)
    }
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

pub struct ApiEmbedder {
    config: EmbeddingApiConfig,
    dimensions: usize,
}

impl ApiEmbedder {
    pub fn new(config: EmbeddingApiConfig) -> Self {
        Self {
            config,
            dimensions: EMBEDDING_DIMENSIONS,
        }
    }

    fn embed_blocking(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let payload = EmbeddingRequest {
            model: self.config.model.clone(),
            input: text.to_string(),
        };

        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()?;

        let mut request = client
            .post(format!("{}/embeddings", self.config.endpoint))
            .json(&payload);

        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send()?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "embeddings".to_string(),
                details: response.status().to_string(),
            });
        }

        let payload: EmbeddingResponse = response.json()?;
        vector_from_response(payload, self.dimensions)
    }
}

fn vector_from_response(
    payload: EmbeddingResponse,
    dimensions: usize,
) -> Result<Vec<f32>, SearchError> {
    let vector = payload
        .data
        .into_iter()
        .next()
        .map(|row| row.embedding)
        .ok_or_else(|| {
            SearchError::Embedding("embedding response contained no vectors".to_string())
        })?;

    if vector.len() != dimensions {
        return Err(SearchError::Embedding(format!(
            "embedding dimension {} does not match expected {}",
            vector.len(),
            dimensions
        )));
    }

    Ok(vector)
}

impl Embedder for ApiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        tokio::task::block_in_place(|| self.embed_blocking(text))
    }
}

pub enum RuntimeEmbedder {
    Api(ApiEmbedder),
    Hashing(HashingEmbedder),
}

impl RuntimeEmbedder {
    pub fn from_env() -> Self {
        match EmbeddingApiConfig::from_env() {
            Some(config) => {
                tracing::info!(endpoint = %config.endpoint, model = %config.model, "using embedding service");
                RuntimeEmbedder::Api(ApiEmbedder::new(config))
            }
            None => {
                tracing::info!("no embedding endpoint configured, using the hashing embedder");
                RuntimeEmbedder::Hashing(HashingEmbedder::default())
            }
        }
    }
}

impl Embedder for RuntimeEmbedder {
    fn dimensions(&self) -> usize {
        match self {
            RuntimeEmbedder::Api(embedder) => embedder.dimensions(),
            RuntimeEmbedder::Hashing(embedder) => embedder.dimensions(),
        }
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        match self {
            RuntimeEmbedder::Api(embedder) => embedder.embed(text),
            RuntimeEmbedder::Hashing(embedder) => embedder.embed(text),
        }
    }
}

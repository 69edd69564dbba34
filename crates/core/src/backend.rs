use crate::config::HTTP_TIMEOUT;
use crate::embeddings::EMBEDDING_DIMENSIONS;
use crate::error::{ConfigError, SearchError};
use crate::models::{FaqDocument, RetrievedDocument};
use crate::queries::all_documents_query;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use url::Url;

#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn ensure_index(&self) -> Result<(), SearchError>;

    async fn index_documents(&self, documents: &[FaqDocument]) -> Result<(), SearchError>;

    async fn search(&self, body: &Value) -> Result<Vec<RetrievedDocument>, SearchError>;

    async fn scan_documents(&self, limit: usize) -> Result<Vec<RetrievedDocument>, SearchError>;

    async fn list_courses(&self) -> Result<Vec<String>, SearchError>;
}

pub struct ElasticsearchBackend {
    client: Arc<Client>,
    endpoint: String,
    index_name: String,
}

impl ElasticsearchBackend {
    pub fn new(
        endpoint: impl Into<String>,
        index_name: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let endpoint = endpoint.into();
        Url::parse(&endpoint)?;

        Ok(Self {
            client: Arc::new(Client::new()),
            endpoint,
            index_name: index_name.into(),
        })
    }
}

#[async_trait]
impl SearchBackend for ElasticsearchBackend {
    async fn ensure_index(&self) -> Result<(), SearchError> {
        let response = self
            .client
            .head(format!("{}/{}", self.endpoint, self.index_name))
            .timeout(HTTP_TIMEOUT)
            .send()
            .await?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }

        if !response.status().is_client_error() {
            return Err(SearchError::BackendResponse {
                backend: "elasticsearch".to_string(),
                details: response.status().to_string(),
            });
        }

        let response = self
            .client
            .put(format!("{}/{}", self.endpoint, self.index_name))
            .timeout(HTTP_TIMEOUT)
            .json(&json!({
                "settings": {
                    "number_of_shards": 1,
                    "number_of_replicas": 0
                },
                "mappings": {
                    "properties": {
                        "text": {"type": "text"},
                        "section": {"type": "text"},
                        "question": {"type": "text"},
                        "course": {"type": "keyword"},
                        "id": {"type": "keyword"},
                        "question_vector": {
                            "type": "dense_vector",
                            "dims": EMBEDDING_DIMENSIONS,
                            "index": true,
                            "similarity": "cosine"
                        },
                        "text_vector": {
                            "type": "dense_vector",
                            "dims": EMBEDDING_DIMENSIONS,
                            "index": true,
                            "similarity": "cosine"
                        },
                        "question_text_vector": {
                            "type": "dense_vector",
                            "dims": EMBEDDING_DIMENSIONS,
                            "index": true,
                            "similarity": "cosine"
                        }
                    }
                }
            }))
            .send()
            .await?;

        if response.status().is_server_error() || response.status().is_client_error() {
            return Err(SearchError::Request(format!(
                "elasticsearch index setup failed with {}",
                response.status()
            )));
        }

        Ok(())
    }

    async fn index_documents(&self, documents: &[FaqDocument]) -> Result<(), SearchError> {
        let mut operations = Vec::new();

        for document in documents {
            operations.push(json!({
                "index": {
                    "_index": self.index_name,
                    "_id": document.id,
                }
            }));
            operations.push(serde_json::to_value(document)?);
        }

        if operations.is_empty() {
            return Ok(());
        }

        let payload: String = operations
            .into_iter()
            .map(|value| serde_json::to_string(&value))
            .collect::<Result<Vec<_>, serde_json::Error>>()?
            .join("\n")
            + "\n";

        let response = self
            .client
            .post(format!("{}/_bulk", self.endpoint))
            .timeout(HTTP_TIMEOUT)
            .header("Content-Type", "application/x-ndjson")
            .body(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "elasticsearch".to_string(),
                details: response.status().to_string(),
            });
        }
        Ok(())
    }

    async fn search(&self, body: &Value) -> Result<Vec<RetrievedDocument>, SearchError> {
        let response = self
            .client
            .post(format!("{}/{}/_search", self.endpoint, self.index_name))
            .timeout(HTTP_TIMEOUT)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "elasticsearch".to_string(),
                details: response.status().to_string(),
            });
        }

        let response_json: Value = response.json().await?;
        parse_hits(&response_json)
    }

    async fn scan_documents(&self, limit: usize) -> Result<Vec<RetrievedDocument>, SearchError> {
        self.search(&all_documents_query(limit)).await
    }

    async fn list_courses(&self) -> Result<Vec<String>, SearchError> {
        let body = json!({
            "size": 0,
            "aggs": {
                "courses": {
                    "terms": {"field": "course", "size": 100}
                }
            }
        });

        let response = self
            .client
            .post(format!("{}/{}/_search", self.endpoint, self.index_name))
            .timeout(HTTP_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "elasticsearch".to_string(),
                details: response.status().to_string(),
            });
        }

        let response_json: Value = response.json().await?;
        let buckets = response_json
            .pointer("/aggregations/courses/buckets")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let courses = buckets
            .iter()
            .filter_map(|bucket| bucket.pointer("/key").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        Ok(courses)
    }
}

fn parse_hits(response: &Value) -> Result<Vec<RetrievedDocument>, SearchError> {
    let hits = response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut documents = Vec::new();

    for hit in hits {
        let source = hit.pointer("/_source").cloned().unwrap_or(Value::Null);
        documents.push(serde_json::from_value(source)?);
    }

    Ok(documents)
}

use crate::backend::SearchBackend;
use crate::error::{EvalError, LlmError, SearchError};
use crate::llm::CompletionApi;
use crate::models::{GroundTruthRecord, RetrievedDocument};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;
const SCAN_LIMIT: usize = 10_000;

const GROUND_TRUTH_PROMPT: &str = "\
You emulate a student taking one of our courses.
Based on the FAQ record below, formulate 5 questions this student might ask.
Each question should be complete and not too short, and the record should
contain its answer. Use as few words from the record itself as possible.

The record:

section: {section}
question: {question}
answer: {text}

Return the result as parsable JSON without code blocks:

[\"question1\", \"question2\", \"question3\", \"question4\", \"question5\"]";

fn ground_truth_prompt(document: &RetrievedDocument) -> String {
    GROUND_TRUTH_PROMPT
        .replace("{section}", &document.section)
        .replace("{question}", &document.question)
        .replace("{text}", &document.text)
}

fn parse_questions(raw: &str) -> Result<Vec<String>, LlmError> {
    let parsed: Value = serde_json::from_str(raw.trim())
        .map_err(|error| LlmError::MalformedResponse(format!("not parsable json: {error}")))?;

    let items: Vec<Value> = match parsed {
        Value::Array(items) => items,
        Value::Object(map) => map.into_iter().map(|(_, item)| item).collect(),
        _ => {
            return Err(LlmError::MalformedResponse(
                "response was neither a list nor a map".to_string(),
            ))
        }
    };

    if items.len() != 5 {
        return Err(LlmError::MalformedResponse(format!(
            "expected 5 questions, got {}",
            items.len()
        )));
    }

    let mut questions = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(question) => questions.push(question),
            _ => {
                return Err(LlmError::MalformedResponse(
                    "every question must be a string".to_string(),
                ))
            }
        }
    }

    Ok(questions)
}

#[async_trait]
pub trait Backoff: Send + Sync {
    async fn wait(&self, attempt: u32);
}

#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub base: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(2),
        }
    }
}

#[async_trait]
impl Backoff for ExponentialBackoff {
    async fn wait(&self, attempt: u32) {
        let delay = self.base * 2u32.saturating_pow(attempt.saturating_sub(1));
        tokio::time::sleep(delay).await;
    }
}

#[derive(Debug, Clone)]
pub struct GroundTruthReport {
    pub records: Vec<GroundTruthRecord>,
    pub total_documents: usize,
    pub failed_documents: Vec<String>,
}

impl GroundTruthReport {
    pub fn success_rate(&self) -> f64 {
        // An empty corpus has nothing to fail.
        if self.total_documents == 0 {
            return 1.0;
        }

        let succeeded = self.total_documents - self.failed_documents.len();
        succeeded as f64 / self.total_documents as f64
    }
}

pub struct GroundTruthGenerator<L, W> {
    completion: L,
    backoff: W,
    max_attempts: u32,
}

impl<L: CompletionApi> GroundTruthGenerator<L, ExponentialBackoff> {
    pub fn new(completion: L) -> Self {
        Self {
            completion,
            backoff: ExponentialBackoff::default(),
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

impl<L, W> GroundTruthGenerator<L, W>
where
    L: CompletionApi,
    W: Backoff,
{
    pub fn with_backoff(completion: L, backoff: W, max_attempts: u32) -> Self {
        Self {
            completion,
            backoff,
            max_attempts,
        }
    }

    pub async fn generate<B: SearchBackend>(
        &self,
        backend: &B,
    ) -> Result<GroundTruthReport, SearchError> {
        let documents = backend.scan_documents(SCAN_LIMIT).await?;
        Ok(self.generate_from_documents(&documents).await)
    }

    pub async fn generate_from_documents(
        &self,
        documents: &[RetrievedDocument],
    ) -> GroundTruthReport {
        let mut records = Vec::new();
        let mut failed_documents = Vec::new();

        for document in documents {
            match self.questions_for_document(document).await {
                Ok(questions) => {
                    for question in questions {
                        records.push(GroundTruthRecord {
                            question,
                            course: document.course.clone(),
                            document: document.id.clone(),
                        });
                    }
                }
                Err(_) => failed_documents.push(document.id.clone()),
            }
        }

        let report = GroundTruthReport {
            records,
            total_documents: documents.len(),
            failed_documents,
        };

        tracing::info!(
            total_documents = report.total_documents,
            failed_documents = report.failed_documents.len(),
            success_rate = report.success_rate(),
            "ground truth generation finished"
        );

        report
    }

    pub async fn questions_for_document(
        &self,
        document: &RetrievedDocument,
    ) -> Result<Vec<String>, LlmError> {
        let prompt = ground_truth_prompt(document);
        let mut attempt = 1u32;

        loop {
            match self.attempt_once(&prompt).await {
                Ok(questions) => return Ok(questions),
                Err(error) if attempt < self.max_attempts => {
                    tracing::warn!(
                        %error,
                        document = %document.id,
                        attempt,
                        "question generation failed, retrying"
                    );
                    self.backoff.wait(attempt).await;
                    attempt += 1;
                }
                Err(error) => {
                    tracing::error!(
                        %error,
                        document = %document.id,
                        attempts = self.max_attempts,
                        "question generation exhausted its attempts"
                    );
                    return Err(error);
                }
            }
        }
    }

    async fn attempt_once(&self, prompt: &str) -> Result<Vec<String>, LlmError> {
        let raw = self.completion.complete(prompt).await?;
        parse_questions(&raw)
    }
}

pub fn save_ground_truth(records: &[GroundTruthRecord], path: &Path) -> Result<(), EvalError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}

pub fn load_ground_truth(path: &Path) -> Result<Vec<GroundTruthRecord>, EvalError> {
    let mut reader = csv::Reader::from_path(path)?;

    let headers = reader.headers()?.clone();
    for column in ["question", "course", "document"] {
        if !headers.iter().any(|header| header == column) {
            return Err(EvalError::MissingColumn(column));
        }
    }

    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }

    Ok(records)
}

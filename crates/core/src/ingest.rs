use crate::backend::SearchBackend;
use crate::embeddings::Embedder;
use crate::error::IngestError;
use crate::models::{CorpusGroup, FaqDocument};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::path::Path;

pub fn load_corpus(path: &Path) -> Result<Vec<CorpusGroup>, IngestError> {
    let raw = std::fs::read_to_string(path)?;
    let groups: Vec<CorpusGroup> = serde_json::from_str(&raw)?;

    if groups.is_empty() {
        return Err(IngestError::InvalidCorpus(format!(
            "no course groups in {}",
            path.display()
        )));
    }

    Ok(groups)
}

pub fn prepare_documents<E: Embedder>(
    groups: &[CorpusGroup],
    embedder: &E,
) -> Result<Vec<FaqDocument>, IngestError> {
    let mut documents = Vec::new();

    for group in groups {
        for entry in &group.documents {
            let text = clean_text_for_json(&entry.text)?;
            let question_text = format!("{} {}", entry.question, text);

            documents.push(FaqDocument {
                id: generate_document_id(&group.course, &entry.question, &text),
                text_vector: embedder.embed(&text)?,
                question_vector: embedder.embed(&entry.question)?,
                question_text_vector: embedder.embed(&question_text)?,
                text,
                question: entry.question.clone(),
                section: entry.section.clone(),
                course: group.course.clone(),
            });
        }
    }

    Ok(documents)
}

#[derive(Debug, Clone, Copy)]
pub struct IngestionReport {
    pub indexed_documents: usize,
    pub courses: usize,
}

pub async fn index_corpus<B, E>(
    path: &Path,
    backend: &B,
    embedder: &E,
) -> Result<IngestionReport, IngestError>
where
    B: SearchBackend,
    E: Embedder,
{
    let groups = load_corpus(path)?;
    let documents = prepare_documents(&groups, embedder)?;

    backend.ensure_index().await?;
    backend.index_documents(&documents).await?;

    tracing::info!(
        documents = documents.len(),
        courses = groups.len(),
        "indexed corpus"
    );

    Ok(IngestionReport {
        indexed_documents: documents.len(),
        courses: groups.len(),
    })
}

pub fn generate_document_id(course: &str, question: &str, text: &str) -> String {
    let text_prefix: String = text.chars().take(12).collect();

    let mut hasher = Sha256::new();
    hasher.update(format!("{course}-{question}-{text_prefix}").as_bytes());
    let digest = format!("{:x}", hasher.finalize());

    digest[..8].to_string()
}

pub fn clean_text_for_json(text: &str) -> Result<String, IngestError> {
    let command_escape = Regex::new(r"\\([a-zA-Z])")?;

    // After this replacement no two adjacent backslashes remain, so the
    // command escape below only ever sees lone backslashes.
    let forward_slashed = text.replace("\\\\", "/");
    let escaped = command_escape.replace_all(&forward_slashed, r"\\$1");

    let trimmed = escaped.trim_end();
    let cleaned = match trimmed.strip_suffix('\\') {
        Some(rest) => format!("{rest}/"),
        None => trimmed.to_string(),
    };

    Ok(cleaned.replace("\r\n", "\n").replace('\r', "\n"))
}

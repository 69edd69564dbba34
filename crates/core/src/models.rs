use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqDocument {
    pub id: String,
    pub text: String,
    pub question: String,
    pub section: String,
    pub course: String,
    pub text_vector: Vec<f32>,
    pub question_vector: Vec<f32>,
    pub question_text_vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub id: String,
    pub text: String,
    pub question: String,
    pub section: String,
    pub course: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruthRecord {
    pub question: String,
    pub course: String,
    pub document: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusGroup {
    pub course: String,
    pub documents: Vec<RawFaq>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFaq {
    pub text: String,
    pub question: String,
    pub section: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrievalMetrics {
    pub hit_rate: f64,
    pub mrr: f64,
}

use crate::config::SearchSettings;
use crate::embeddings::Embedder;
use crate::error::SearchError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const SOURCE_FIELDS: [&str; 5] = ["id", "text", "section", "question", "course"];

const COMBINED_SCORE_SCRIPT: &str = "cosineSimilarity(params.query_vector, 'question_vector') + \
     cosineSimilarity(params.query_vector, 'text_vector') + \
     cosineSimilarity(params.query_vector, 'question_text_vector') + 1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    Text,
    Vector,
    QuestionKnn,
    TextKnn,
    QuestionTextKnn,
    CombinedKnn,
}

impl SearchStrategy {
    pub const ALL: [SearchStrategy; 6] = [
        SearchStrategy::Text,
        SearchStrategy::Vector,
        SearchStrategy::QuestionKnn,
        SearchStrategy::TextKnn,
        SearchStrategy::QuestionTextKnn,
        SearchStrategy::CombinedKnn,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            SearchStrategy::Text => "text",
            SearchStrategy::Vector => "vector",
            SearchStrategy::QuestionKnn => "question_knn",
            SearchStrategy::TextKnn => "text_knn",
            SearchStrategy::QuestionTextKnn => "question_text_knn",
            SearchStrategy::CombinedKnn => "combined_knn",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SearchStrategy::Text => "Text Search",
            SearchStrategy::Vector => "Vector Search",
            SearchStrategy::QuestionKnn => "Question KNN",
            SearchStrategy::TextKnn => "Text KNN",
            SearchStrategy::QuestionTextKnn => "Question-Text KNN",
            SearchStrategy::CombinedKnn => "Combined KNN",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SearchStrategy::Text => "Traditional keyword-based search",
            SearchStrategy::Vector => "Cosine similarity over the text vector",
            SearchStrategy::QuestionKnn => "KNN over the question vector field",
            SearchStrategy::TextKnn => "KNN over the text vector field",
            SearchStrategy::QuestionTextKnn => "KNN over the combined question-text vector field",
            SearchStrategy::CombinedKnn => "Summed similarity over all vector fields",
        }
    }
}

impl std::str::FromStr for SearchStrategy {
    type Err = SearchError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|strategy| strategy.key() == raw)
            .ok_or_else(|| SearchError::Request(format!("unknown search strategy: {raw}")))
    }
}

impl std::fmt::Display for SearchStrategy {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.key())
    }
}

pub struct QueryPlanner<E> {
    embedder: E,
    settings: SearchSettings,
}

impl<E: Embedder> QueryPlanner<E> {
    pub fn new(embedder: E, settings: SearchSettings) -> Self {
        Self { embedder, settings }
    }

    pub fn plan(
        &self,
        strategy: SearchStrategy,
        query: &str,
        course: Option<&str>,
    ) -> Result<Value, SearchError> {
        match strategy {
            SearchStrategy::Text => Ok(self.text_query(query, course)),
            SearchStrategy::Vector => self.vector_query(query, course),
            SearchStrategy::QuestionKnn => self.knn_query("question_vector", query, course),
            SearchStrategy::TextKnn => self.knn_query("text_vector", query, course),
            SearchStrategy::QuestionTextKnn => {
                self.knn_query("question_text_vector", query, course)
            }
            SearchStrategy::CombinedKnn => self.combined_knn_query(query, course),
        }
    }

    fn text_query(&self, query: &str, course: Option<&str>) -> Value {
        json!({
            "size": self.settings.max_results,
            "query": {
                "bool": {
                    "should": [
                        {"match": {"text": {"query": query, "boost": self.settings.text_boost}}},
                        {"match": {"question": {"query": query}}}
                    ],
                    "filter": course_filter(course),
                    "minimum_should_match": 1
                }
            }
        })
    }

    fn vector_query(&self, query: &str, course: Option<&str>) -> Result<Value, SearchError> {
        let query_vector = self.embedder.embed(query)?;

        Ok(json!({
            "size": self.settings.max_results,
            "query": {
                "bool": {
                    "must": [{
                        "script_score": {
                            "query": {"match_all": {}},
                            "script": {
                                "source": "cosineSimilarity(params.query_vector, 'text_vector') + 1.0",
                                "params": {"query_vector": query_vector}
                            }
                        }
                    }],
                    "filter": course_filter(course)
                }
            }
        }))
    }

    fn knn_query(
        &self,
        field: &str,
        query: &str,
        course: Option<&str>,
    ) -> Result<Value, SearchError> {
        let query_vector = self.embedder.embed(query)?;

        let mut knn = json!({
            "field": field,
            "query_vector": query_vector,
            "k": self.settings.max_results,
            "num_candidates": self.settings.num_candidates,
        });

        if let Some(course) = course {
            knn["filter"] = json!({"term": {"course": course}});
        }

        Ok(json!({
            "knn": knn,
            "_source": SOURCE_FIELDS,
        }))
    }

    fn combined_knn_query(&self, query: &str, course: Option<&str>) -> Result<Value, SearchError> {
        let query_vector = self.embedder.embed(query)?;

        Ok(json!({
            "size": self.settings.max_results,
            "query": {
                "bool": {
                    "must": [{
                        "script_score": {
                            "query": {"match_all": {}},
                            "script": {
                                "source": COMBINED_SCORE_SCRIPT,
                                "params": {"query_vector": query_vector}
                            }
                        }
                    }],
                    "filter": course_filter(course)
                }
            },
            "_source": SOURCE_FIELDS,
        }))
    }
}

pub fn all_documents_query(size: usize) -> Value {
    json!({
        "size": size,
        "query": {"match_all": {}},
        "_source": SOURCE_FIELDS,
    })
}

fn course_filter(course: Option<&str>) -> Vec<Value> {
    match course {
        Some(course) => vec![json!({"term": {"course": course}})],
        None => Vec::new(),
    }
}

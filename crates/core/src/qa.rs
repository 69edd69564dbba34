use crate::backend::SearchBackend;
use crate::embeddings::Embedder;
use crate::error::SearchError;
use crate::llm::CompletionApi;
use crate::models::RetrievedDocument;
use crate::queries::{QueryPlanner, SearchStrategy};

pub const NO_CONTEXT_ANSWER: &str =
    "I couldn't find any relevant information to answer your question.";

pub const COMPLETION_FAILURE_ANSWER: &str =
    "I apologize, but I encountered an error while processing your question. Please try again.";

const CONTEXT_TEMPLATE: &str = "Section: {section}\nQuestion: {question}\nAnswer: {text}";

const PROMPT_TEMPLATE: &str = "\
You're a course teaching assistant.
Answer the user QUESTION based on CONTEXT - the documents retrieved from our FAQ database.
Don't use other information outside of the provided CONTEXT.

QUESTION: {user_question}

CONTEXT:

{context}";

pub fn build_context(documents: &[RetrievedDocument]) -> String {
    documents
        .iter()
        .map(|document| {
            CONTEXT_TEMPLATE
                .replace("{section}", &document.section)
                .replace("{question}", &document.question)
                .replace("{text}", &document.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_prompt(user_question: &str, documents: &[RetrievedDocument]) -> String {
    PROMPT_TEMPLATE
        .replace("{user_question}", user_question)
        .replace("{context}", &build_context(documents))
}

pub struct QaCoordinator<E, B, L> {
    planner: QueryPlanner<E>,
    backend: B,
    completion: L,
    strategy: SearchStrategy,
}

impl<E, B, L> QaCoordinator<E, B, L>
where
    E: Embedder + Send + Sync,
    B: SearchBackend,
    L: CompletionApi,
{
    pub fn new(planner: QueryPlanner<E>, backend: B, completion: L) -> Self {
        Self {
            planner,
            backend,
            completion,
            strategy: SearchStrategy::Text,
        }
    }

    pub fn with_strategy(mut self, strategy: SearchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> SearchStrategy {
        self.strategy
    }

    pub async fn answer(&self, question: &str, course: Option<&str>) -> String {
        let documents = match self.retrieve(question, course).await {
            Ok(documents) => documents,
            Err(error) => {
                tracing::error!(%error, strategy = %self.strategy, "retrieval failed");
                Vec::new()
            }
        };

        if documents.is_empty() {
            tracing::warn!(question, "no relevant documents found");
            return NO_CONTEXT_ANSWER.to_string();
        }

        let prompt = build_prompt(question, &documents);
        match self.completion.complete(&prompt).await {
            Ok(answer) => answer,
            Err(error) => {
                tracing::error!(%error, "completion request failed");
                COMPLETION_FAILURE_ANSWER.to_string()
            }
        }
    }

    pub async fn retrieve(
        &self,
        question: &str,
        course: Option<&str>,
    ) -> Result<Vec<RetrievedDocument>, SearchError> {
        let body = self.planner.plan(self.strategy, question, course)?;
        self.backend.search(&body).await
    }
}

#[cfg(test)]
mod tests {
    use super::{build_context, QaCoordinator, COMPLETION_FAILURE_ANSWER, NO_CONTEXT_ANSWER};
    use crate::backend::SearchBackend;
    use crate::config::SearchSettings;
    use crate::embeddings::HashingEmbedder;
    use crate::error::{LlmError, SearchError};
    use crate::llm::CompletionApi;
    use crate::models::{FaqDocument, RetrievedDocument};
    use crate::queries::{QueryPlanner, SearchStrategy};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn faq_document(id: &str, question: &str, text: &str) -> RetrievedDocument {
        RetrievedDocument {
            id: id.to_string(),
            text: text.to_string(),
            question: question.to_string(),
            section: "General".to_string(),
            course: "data-engineering-zoomcamp".to_string(),
        }
    }

    struct CannedBackend {
        documents: Vec<RetrievedDocument>,
        should_fail: bool,
    }

    #[async_trait]
    impl SearchBackend for CannedBackend {
        async fn ensure_index(&self) -> Result<(), SearchError> {
            Ok(())
        }

        async fn index_documents(&self, _documents: &[FaqDocument]) -> Result<(), SearchError> {
            Ok(())
        }

        async fn search(&self, _body: &Value) -> Result<Vec<RetrievedDocument>, SearchError> {
            if self.should_fail {
                return Err(SearchError::Request("search exploded".to_string()));
            }
            Ok(self.documents.clone())
        }

        async fn scan_documents(
            &self,
            _limit: usize,
        ) -> Result<Vec<RetrievedDocument>, SearchError> {
            Ok(self.documents.clone())
        }

        async fn list_courses(&self) -> Result<Vec<String>, SearchError> {
            Ok(Vec::new())
        }
    }

    struct RecordingCompletion {
        seen_prompt: Arc<Mutex<Option<String>>>,
        calls: Arc<AtomicUsize>,
        should_fail: bool,
    }

    #[async_trait]
    impl CompletionApi for RecordingCompletion {
        async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen_prompt.lock().unwrap() = Some(prompt.to_string());
            if self.should_fail {
                return Err(LlmError::Api("completion exploded".to_string()));
            }
            Ok("The course starts in January.".to_string())
        }
    }

    fn coordinator(
        backend: CannedBackend,
        completion: RecordingCompletion,
    ) -> QaCoordinator<HashingEmbedder, CannedBackend, RecordingCompletion> {
        let planner = QueryPlanner::new(
            HashingEmbedder { dimensions: 8 },
            SearchSettings::default(),
        );
        QaCoordinator::new(planner, backend, completion)
    }

    #[test]
    fn context_renders_one_block_per_document() {
        let documents = vec![
            faq_document("a", "Q1?", "A1."),
            faq_document("b", "Q2?", "A2."),
        ];

        let context = build_context(&documents);

        assert_eq!(
            context,
            "Section: General\nQuestion: Q1?\nAnswer: A1.\n\nSection: General\nQuestion: Q2?\nAnswer: A2."
        );
    }

    #[tokio::test]
    async fn answers_flow_question_and_context_into_the_prompt() {
        let seen_prompt = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicUsize::new(0));
        let coordinator = coordinator(
            CannedBackend {
                documents: vec![faq_document("a", "When does it start?", "In January.")],
                should_fail: false,
            },
            RecordingCompletion {
                seen_prompt: Arc::clone(&seen_prompt),
                calls: Arc::clone(&calls),
                should_fail: false,
            },
        );

        let answer = coordinator.answer("when does the course begin?", None).await;

        assert_eq!(answer, "The course starts in January.");
        let prompt = seen_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("QUESTION: when does the course begin?"));
        assert!(prompt.contains("Answer: In January."));
    }

    #[tokio::test]
    async fn empty_retrieval_short_circuits_before_the_completion_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let coordinator = coordinator(
            CannedBackend {
                documents: Vec::new(),
                should_fail: false,
            },
            RecordingCompletion {
                seen_prompt: Arc::new(Mutex::new(None)),
                calls: Arc::clone(&calls),
                should_fail: false,
            },
        );

        let answer = coordinator.answer("anything?", None).await;

        assert_eq!(answer, NO_CONTEXT_ANSWER);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn retrieval_failure_reads_as_no_context_not_as_a_crash() {
        let coordinator = coordinator(
            CannedBackend {
                documents: Vec::new(),
                should_fail: true,
            },
            RecordingCompletion {
                seen_prompt: Arc::new(Mutex::new(None)),
                calls: Arc::new(AtomicUsize::new(0)),
                should_fail: false,
            },
        );

        let answer = coordinator.answer("anything?", Some("ml-zoomcamp")).await;

        assert_eq!(answer, NO_CONTEXT_ANSWER);
    }

    #[tokio::test]
    async fn completion_failure_becomes_the_apology() {
        let coordinator = coordinator(
            CannedBackend {
                documents: vec![faq_document("a", "Q?", "A.")],
                should_fail: false,
            },
            RecordingCompletion {
                seen_prompt: Arc::new(Mutex::new(None)),
                calls: Arc::new(AtomicUsize::new(0)),
                should_fail: true,
            },
        );

        let answer = coordinator.answer("anything?", None).await;

        assert_eq!(answer, COMPLETION_FAILURE_ANSWER);
    }

    #[tokio::test]
    async fn strategy_defaults_to_text_and_can_be_swapped() {
        let coordinator = coordinator(
            CannedBackend {
                documents: Vec::new(),
                should_fail: false,
            },
            RecordingCompletion {
                seen_prompt: Arc::new(Mutex::new(None)),
                calls: Arc::new(AtomicUsize::new(0)),
                should_fail: false,
            },
        );

        assert_eq!(coordinator.strategy(), SearchStrategy::Text);
        let coordinator = coordinator.with_strategy(SearchStrategy::CombinedKnn);
        assert_eq!(coordinator.strategy(), SearchStrategy::CombinedKnn);
    }
}

pub mod backend;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod evaluate;
pub mod ground_truth;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod qa;
pub mod queries;

pub use backend::{ElasticsearchBackend, SearchBackend};
pub use config::{CompletionConfig, EmbeddingApiConfig, SearchSettings, HTTP_TIMEOUT};
pub use embeddings::{
    ApiEmbedder, Embedder, HashingEmbedder, RuntimeEmbedder, EMBEDDING_DIMENSIONS,
};
pub use error::{ConfigError, EvalError, IngestError, LlmError, SearchError};
pub use evaluate::{
    compare_strategies, evaluate, hit_rate, mrr, ArtifactPaths, ComparisonReport, EvaluationRun,
    Retriever, StrategyEvaluation, StrategyRetriever,
};
pub use ground_truth::{
    load_ground_truth, save_ground_truth, Backoff, ExponentialBackoff, GroundTruthGenerator,
    GroundTruthReport,
};
pub use ingest::{
    clean_text_for_json, generate_document_id, index_corpus, load_corpus, prepare_documents,
    IngestionReport,
};
pub use llm::{CompletionApi, OpenAiChatApi};
pub use models::{
    CorpusGroup, FaqDocument, GroundTruthRecord, RawFaq, RetrievalMetrics, RetrievedDocument,
};
pub use qa::{
    build_context, build_prompt, QaCoordinator, COMPLETION_FAILURE_ANSWER, NO_CONTEXT_ANSWER,
};
pub use queries::{all_documents_query, QueryPlanner, SearchStrategy};

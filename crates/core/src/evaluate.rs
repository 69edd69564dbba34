use crate::backend::SearchBackend;
use crate::embeddings::Embedder;
use crate::error::{EvalError, SearchError};
use crate::models::{GroundTruthRecord, RetrievalMetrics, RetrievedDocument};
use crate::queries::{QueryPlanner, SearchStrategy};
use async_trait::async_trait;
use chrono::Local;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub fn hit_rate(relevance_lists: &[Vec<bool>]) -> f64 {
    if relevance_lists.is_empty() {
        tracing::debug!("hit rate requested for an empty batch");
        return 0.0;
    }

    let hits = relevance_lists
        .iter()
        .filter(|relevance| relevance.contains(&true))
        .count();

    hits as f64 / relevance_lists.len() as f64
}

pub fn mrr(relevance_lists: &[Vec<bool>]) -> f64 {
    if relevance_lists.is_empty() {
        tracing::debug!("mrr requested for an empty batch");
        return 0.0;
    }

    let total: f64 = relevance_lists
        .iter()
        .map(|relevance| {
            relevance
                .iter()
                .position(|hit| *hit)
                .map(|position| 1.0 / (position + 1) as f64)
                .unwrap_or(0.0)
        })
        .sum();

    total / relevance_lists.len() as f64
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(
        &self,
        question: &str,
        course: Option<&str>,
    ) -> Result<Vec<RetrievedDocument>, SearchError>;
}

pub struct StrategyRetriever<'a, E, B> {
    planner: &'a QueryPlanner<E>,
    backend: &'a B,
    strategy: SearchStrategy,
}

impl<'a, E, B> StrategyRetriever<'a, E, B> {
    pub fn new(planner: &'a QueryPlanner<E>, backend: &'a B, strategy: SearchStrategy) -> Self {
        Self {
            planner,
            backend,
            strategy,
        }
    }
}

#[async_trait]
impl<E, B> Retriever for StrategyRetriever<'_, E, B>
where
    E: Embedder + Send + Sync,
    B: SearchBackend,
{
    async fn retrieve(
        &self,
        question: &str,
        course: Option<&str>,
    ) -> Result<Vec<RetrievedDocument>, SearchError> {
        let body = self.planner.plan(self.strategy, question, course)?;
        self.backend.search(&body).await
    }
}

#[derive(Debug, Clone)]
pub struct EvaluationRun {
    pub metrics: RetrievalMetrics,
    pub total_queries: usize,
    pub failed_queries: usize,
    pub elapsed: Duration,
}

impl EvaluationRun {
    pub fn successful_queries(&self) -> usize {
        self.total_queries - self.failed_queries
    }

    pub fn elapsed_minutes(&self) -> f64 {
        self.elapsed.as_secs_f64() / 60.0
    }
}

#[derive(Debug, Clone)]
pub struct StrategyEvaluation {
    pub strategy: SearchStrategy,
    pub run: EvaluationRun,
}

pub async fn evaluate<R>(retriever: &R, ground_truth: &[GroundTruthRecord]) -> EvaluationRun
where
    R: Retriever + ?Sized,
{
    let started = Instant::now();
    let mut relevance_lists = Vec::with_capacity(ground_truth.len());
    let mut failed_queries = 0usize;

    for record in ground_truth {
        match retriever
            .retrieve(&record.question, Some(&record.course))
            .await
        {
            Ok(results) => {
                let relevance = results
                    .iter()
                    .map(|result| result.id == record.document)
                    .collect::<Vec<_>>();
                relevance_lists.push(relevance);
            }
            Err(error) => {
                tracing::warn!(%error, question = %record.question, "evaluation query failed");
                failed_queries += 1;
                // A failed query counts as a miss, not as a skipped query.
                relevance_lists.push(vec![false]);
            }
        }
    }

    EvaluationRun {
        metrics: RetrievalMetrics {
            hit_rate: hit_rate(&relevance_lists),
            mrr: mrr(&relevance_lists),
        },
        total_queries: ground_truth.len(),
        failed_queries,
        elapsed: started.elapsed(),
    }
}

#[derive(Debug, Clone)]
pub struct ComparisonReport {
    pub evaluations: Vec<StrategyEvaluation>,
    pub total_elapsed: Duration,
}

pub async fn compare_strategies<E, B>(
    planner: &QueryPlanner<E>,
    backend: &B,
    strategies: &[SearchStrategy],
    ground_truth: &[GroundTruthRecord],
) -> ComparisonReport
where
    E: Embedder + Send + Sync,
    B: SearchBackend,
{
    let started = Instant::now();
    let mut evaluations = Vec::with_capacity(strategies.len());

    for strategy in strategies {
        tracing::info!(strategy = %strategy, "evaluating strategy");
        let retriever = StrategyRetriever::new(planner, backend, *strategy);
        let run = evaluate(&retriever, ground_truth).await;
        tracing::info!(
            strategy = %strategy,
            hit_rate = run.metrics.hit_rate,
            mrr = run.metrics.mrr,
            failed_queries = run.failed_queries,
            "strategy evaluated"
        );
        evaluations.push(StrategyEvaluation {
            strategy: *strategy,
            run,
        });
    }

    evaluations.sort_by(|left, right| right.run.metrics.mrr.total_cmp(&left.run.metrics.mrr));

    ComparisonReport {
        evaluations,
        total_elapsed: started.elapsed(),
    }
}

#[derive(Debug)]
pub struct ArtifactPaths {
    pub csv: PathBuf,
    pub json: PathBuf,
}

impl ComparisonReport {
    pub fn write_artifacts(
        &self,
        results_dir: &Path,
        ground_truth_path: &Path,
    ) -> Result<ArtifactPaths, EvalError> {
        std::fs::create_dir_all(results_dir)?;
        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();

        let csv_path = results_dir.join(format!("evaluation_results_{timestamp}.csv"));
        let mut writer = csv::Writer::from_path(&csv_path)?;
        writer.write_record(["Method", "Hit Rate", "MRR", "Time (minutes)"])?;
        for evaluation in &self.evaluations {
            writer.write_record([
                evaluation.strategy.label().to_string(),
                format!("{:.3}", evaluation.run.metrics.hit_rate),
                format!("{:.3}", evaluation.run.metrics.mrr),
                format!("{:.2}", evaluation.run.elapsed_minutes()),
            ])?;
        }
        writer.flush()?;

        let mut results = serde_json::Map::new();
        for evaluation in &self.evaluations {
            results.insert(
                evaluation.strategy.key().to_string(),
                json!({
                    "name": evaluation.strategy.label(),
                    "description": evaluation.strategy.description(),
                    "hit_rate": evaluation.run.metrics.hit_rate,
                    "mrr": evaluation.run.metrics.mrr,
                    "time_minutes": evaluation.run.elapsed_minutes(),
                    "total_queries": evaluation.run.total_queries,
                    "failed_queries": evaluation.run.failed_queries,
                }),
            );
        }

        let payload = json!({
            "timestamp": timestamp,
            "total_time_minutes": self.total_elapsed.as_secs_f64() / 60.0,
            "methods_evaluated": self.evaluations.len(),
            "ground_truth_path": ground_truth_path.display().to_string(),
            "results": results,
        });

        let json_path = results_dir.join(format!("evaluation_results_{timestamp}.json"));
        std::fs::write(&json_path, serde_json::to_string_pretty(&payload)?)?;

        Ok(ArtifactPaths {
            csv: csv_path,
            json: json_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{
        compare_strategies, evaluate, hit_rate, mrr, ComparisonReport, EvaluationRun, Retriever,
        StrategyEvaluation,
    };
    use crate::backend::SearchBackend;
    use crate::config::SearchSettings;
    use crate::embeddings::HashingEmbedder;
    use crate::error::SearchError;
    use crate::models::{FaqDocument, GroundTruthRecord, RetrievalMetrics, RetrievedDocument};
    use crate::queries::{QueryPlanner, SearchStrategy};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::time::Duration;

    fn record(question: &str, document: &str) -> GroundTruthRecord {
        GroundTruthRecord {
            question: question.to_string(),
            course: "data-engineering-zoomcamp".to_string(),
            document: document.to_string(),
        }
    }

    fn retrieved(id: &str) -> RetrievedDocument {
        RetrievedDocument {
            id: id.to_string(),
            text: "answer".to_string(),
            question: "question".to_string(),
            section: "section".to_string(),
            course: "data-engineering-zoomcamp".to_string(),
        }
    }

    struct EchoRetriever;

    #[async_trait]
    impl Retriever for EchoRetriever {
        async fn retrieve(
            &self,
            question: &str,
            _course: Option<&str>,
        ) -> Result<Vec<RetrievedDocument>, SearchError> {
            Ok(vec![retrieved(question)])
        }
    }

    struct EmptyRetriever;

    #[async_trait]
    impl Retriever for EmptyRetriever {
        async fn retrieve(
            &self,
            _question: &str,
            _course: Option<&str>,
        ) -> Result<Vec<RetrievedDocument>, SearchError> {
            Ok(Vec::new())
        }
    }

    struct FailingRetriever;

    #[async_trait]
    impl Retriever for FailingRetriever {
        async fn retrieve(
            &self,
            _question: &str,
            _course: Option<&str>,
        ) -> Result<Vec<RetrievedDocument>, SearchError> {
            Err(SearchError::Request("backend unavailable".to_string()))
        }
    }

    #[test]
    fn metrics_match_hand_computed_batches() {
        assert_eq!(mrr(&[vec![true]]), 1.0);
        assert_eq!(mrr(&[vec![false, true]]), 0.5);
        assert_eq!(mrr(&[vec![false], vec![false]]), 0.0);
        assert_eq!(hit_rate(&[vec![true, false], vec![false, false]]), 0.5);
    }

    #[test]
    fn metrics_are_zero_on_empty_batches() {
        assert_eq!(hit_rate(&[]), 0.0);
        assert_eq!(mrr(&[]), 0.0);
    }

    #[test]
    fn first_hit_decides_the_reciprocal_rank() {
        assert_eq!(mrr(&[vec![false, true, true]]), 0.5);
    }

    #[tokio::test]
    async fn perfect_retrieval_scores_one() {
        let ground_truth = vec![
            record("q1", "q1"),
            record("q2", "q2"),
            record("q3", "q3"),
        ];

        let run = evaluate(&EchoRetriever, &ground_truth).await;

        assert_eq!(run.metrics.hit_rate, 1.0);
        assert_eq!(run.metrics.mrr, 1.0);
        assert_eq!(run.total_queries, 3);
        assert_eq!(run.failed_queries, 0);
        assert_eq!(run.successful_queries(), 3);
    }

    #[tokio::test]
    async fn empty_results_score_zero_without_counting_as_failures() {
        let ground_truth = vec![record("q1", "doc-1"), record("q2", "doc-2")];

        let run = evaluate(&EmptyRetriever, &ground_truth).await;

        assert_eq!(run.metrics.hit_rate, 0.0);
        assert_eq!(run.metrics.mrr, 0.0);
        assert_eq!(run.failed_queries, 0);
    }

    #[tokio::test]
    async fn failing_queries_become_misses_and_the_batch_continues() {
        let ground_truth = vec![record("q1", "q1"), record("q2", "q2")];

        let run = evaluate(&FailingRetriever, &ground_truth).await;

        assert_eq!(run.metrics.hit_rate, 0.0);
        assert_eq!(run.metrics.mrr, 0.0);
        assert_eq!(run.total_queries, 2);
        assert_eq!(run.failed_queries, 2);
    }

    struct FlakyRetriever {
        poisoned_question: String,
    }

    #[async_trait]
    impl Retriever for FlakyRetriever {
        async fn retrieve(
            &self,
            question: &str,
            _course: Option<&str>,
        ) -> Result<Vec<RetrievedDocument>, SearchError> {
            if question == self.poisoned_question {
                return Err(SearchError::Request("poisoned".to_string()));
            }
            Ok(vec![retrieved(question)])
        }
    }

    #[tokio::test]
    async fn partial_failures_widen_the_denominator() {
        let ground_truth = vec![record("q1", "q1"), record("q2", "q2")];
        let retriever = FlakyRetriever {
            poisoned_question: "q2".to_string(),
        };

        let run = evaluate(&retriever, &ground_truth).await;

        assert_eq!(run.metrics.hit_rate, 0.5);
        assert_eq!(run.metrics.mrr, 0.5);
        assert_eq!(run.failed_queries, 1);
        assert_eq!(run.successful_queries(), 1);
    }

    struct KnnOnlyBackend;

    #[async_trait]
    impl SearchBackend for KnnOnlyBackend {
        async fn ensure_index(&self) -> Result<(), SearchError> {
            Ok(())
        }

        async fn index_documents(&self, _documents: &[FaqDocument]) -> Result<(), SearchError> {
            Ok(())
        }

        async fn search(&self, body: &Value) -> Result<Vec<RetrievedDocument>, SearchError> {
            if body.get("knn").is_some() {
                Ok(vec![retrieved("expected")])
            } else {
                Ok(vec![retrieved("something-else")])
            }
        }

        async fn scan_documents(
            &self,
            _limit: usize,
        ) -> Result<Vec<RetrievedDocument>, SearchError> {
            Ok(Vec::new())
        }

        async fn list_courses(&self) -> Result<Vec<String>, SearchError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn comparison_ranks_strategies_by_mrr() {
        let planner = QueryPlanner::new(
            HashingEmbedder { dimensions: 8 },
            SearchSettings::default(),
        );
        let ground_truth = vec![record("q1", "expected")];

        let report = compare_strategies(
            &planner,
            &KnnOnlyBackend,
            &[SearchStrategy::Text, SearchStrategy::TextKnn],
            &ground_truth,
        )
        .await;

        assert_eq!(report.evaluations.len(), 2);
        assert_eq!(report.evaluations[0].strategy, SearchStrategy::TextKnn);
        assert_eq!(report.evaluations[0].run.metrics.mrr, 1.0);
        assert_eq!(report.evaluations[1].strategy, SearchStrategy::Text);
        assert_eq!(report.evaluations[1].run.metrics.mrr, 0.0);
    }

    fn canned_report() -> ComparisonReport {
        let run = |hit_rate: f64, mrr: f64| EvaluationRun {
            metrics: RetrievalMetrics { hit_rate, mrr },
            total_queries: 10,
            failed_queries: 1,
            elapsed: Duration::from_secs(90),
        };

        ComparisonReport {
            evaluations: vec![
                StrategyEvaluation {
                    strategy: SearchStrategy::CombinedKnn,
                    run: run(0.9, 0.85),
                },
                StrategyEvaluation {
                    strategy: SearchStrategy::Text,
                    run: run(0.6, 0.4),
                },
            ],
            total_elapsed: Duration::from_secs(180),
        }
    }

    #[test]
    fn artifacts_carry_the_table_and_the_structured_record(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let report = canned_report();

        let paths = report.write_artifacts(dir.path(), std::path::Path::new("ground-truth.csv"))?;

        let table = std::fs::read_to_string(&paths.csv)?;
        let mut lines = table.lines();
        assert_eq!(lines.next(), Some("Method,Hit Rate,MRR,Time (minutes)"));
        assert_eq!(lines.next(), Some("Combined KNN,0.900,0.850,1.50"));
        assert_eq!(lines.next(), Some("Text Search,0.600,0.400,1.50"));

        let payload: Value = serde_json::from_str(&std::fs::read_to_string(&paths.json)?)?;
        assert_eq!(payload["methods_evaluated"], 2);
        assert_eq!(payload["ground_truth_path"], "ground-truth.csv");
        assert_eq!(payload["results"]["combined_knn"]["mrr"], 0.85);
        assert_eq!(payload["results"]["text"]["failed_queries"], 1);
        assert_eq!(payload["total_time_minutes"], 3.0);
        Ok(())
    }
}

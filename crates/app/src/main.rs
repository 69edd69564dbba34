use clap::{Parser, Subcommand};
use chrono::Utc;
use faq_search_core::{
    compare_strategies, index_corpus, load_ground_truth, save_ground_truth, CompletionConfig,
    ElasticsearchBackend, GroundTruthGenerator, OpenAiChatApi, QaCoordinator, QueryPlanner,
    RuntimeEmbedder, SearchSettings, SearchStrategy,
};
use faq_search_core::SearchBackend;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter, prelude::*};

#[derive(Parser)]
#[command(name = "faq-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Elasticsearch base URL
    #[arg(long, env = "ELASTICSEARCH_HOST", default_value = "http://localhost:9200")]
    elasticsearch_url: String,

    /// Elasticsearch index name
    #[arg(long, env = "ELASTICSEARCH_INDEX_NAME", default_value = "course-questions")]
    index: String,
}

#[derive(Subcommand)]
enum Command {
    /// Index a course FAQ corpus file into Elasticsearch.
    Index {
        /// Path to the corpus JSON file.
        #[arg(long)]
        file: PathBuf,
    },
    /// Answer a question from the indexed FAQ documents.
    Ask {
        /// Question to answer.
        #[arg(long)]
        question: String,
        /// Restrict retrieval to a single course.
        #[arg(long)]
        course: Option<String>,
        /// Retrieval strategy to answer with.
        #[arg(long, default_value = "text")]
        strategy: SearchStrategy,
    },
    /// Replay a ground-truth file through retrieval strategies and rank them.
    Evaluate {
        /// Path to the ground-truth CSV.
        #[arg(long)]
        ground_truth: PathBuf,
        /// Comma-separated strategies to evaluate; all of them when omitted.
        #[arg(long, value_delimiter = ',')]
        strategies: Vec<SearchStrategy>,
        /// Directory that receives the CSV and JSON result artifacts.
        #[arg(long, default_value = "evaluation-results")]
        results_dir: PathBuf,
    },
    /// Generate evaluation questions for every indexed document.
    GenerateGroundTruth {
        /// Where to write the ground-truth CSV.
        #[arg(long, default_value = "ground-truth.csv")]
        output: PathBuf,
    },
    /// List the courses present in the index.
    ListCourses,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let backend = ElasticsearchBackend::new(&cli.elasticsearch_url, &cli.index)
        .map_err(|error| anyhow::anyhow!(error.to_string()))?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        elasticsearch_url = %cli.elasticsearch_url,
        index = %cli.index,
        "faq-search boot"
    );

    match cli.command {
        Command::Index { file } => {
            let embedder = RuntimeEmbedder::from_env();
            let report = index_corpus(&file, &backend, &embedder)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!(
                "{} documents indexed across {} courses at {}",
                report.indexed_documents,
                report.courses,
                Utc::now().to_rfc3339()
            );
        }
        Command::Ask {
            question,
            course,
            strategy,
        } => {
            let embedder = RuntimeEmbedder::from_env();
            let settings = SearchSettings::from_env()
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let planner = QueryPlanner::new(embedder, settings);
            let completion_config = CompletionConfig::from_env()
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let completion = OpenAiChatApi::new(completion_config)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            let coordinator =
                QaCoordinator::new(planner, backend, completion).with_strategy(strategy);
            let answer = coordinator.answer(&question, course.as_deref()).await;

            println!("{answer}");
        }
        Command::Evaluate {
            ground_truth,
            strategies,
            results_dir,
        } => {
            let embedder = RuntimeEmbedder::from_env();
            let settings = SearchSettings::from_env()
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let planner = QueryPlanner::new(embedder, settings);
            let records = load_ground_truth(&ground_truth)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let strategies = if strategies.is_empty() {
                SearchStrategy::ALL.to_vec()
            } else {
                strategies
            };

            info!(
                queries = records.len(),
                strategies = strategies.len(),
                "starting evaluation"
            );

            let report = compare_strategies(&planner, &backend, &strategies, &records).await;

            println!(
                "{:<18} {:>9} {:>7} {:>15}",
                "Method", "Hit Rate", "MRR", "Time (minutes)"
            );
            for evaluation in &report.evaluations {
                println!(
                    "{:<18} {:>9.3} {:>7.3} {:>15.2}",
                    evaluation.strategy.label(),
                    evaluation.run.metrics.hit_rate,
                    evaluation.run.metrics.mrr,
                    evaluation.run.elapsed_minutes()
                );
            }

            let artifacts = report
                .write_artifacts(&results_dir, &ground_truth)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!(
                "results written to {} and {}",
                artifacts.csv.display(),
                artifacts.json.display()
            );
        }
        Command::GenerateGroundTruth { output } => {
            let completion_config = CompletionConfig::from_env()
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            let completion = OpenAiChatApi::new(completion_config)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            let generator = GroundTruthGenerator::new(completion);
            let report = generator
                .generate(&backend)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            save_ground_truth(&report.records, &output)
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            println!(
                "{} questions generated from {} documents ({:.0}% success) at {}",
                report.records.len(),
                report.total_documents,
                report.success_rate() * 100.0,
                output.display()
            );
            if !report.failed_documents.is_empty() {
                println!("documents without questions: {}", report.failed_documents.join(", "));
            }
        }
        Command::ListCourses => {
            let courses = backend
                .list_courses()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            if courses.is_empty() {
                println!("no courses indexed");
            }
            for course in courses {
                println!("{course}");
            }
        }
    }

    Ok(())
}

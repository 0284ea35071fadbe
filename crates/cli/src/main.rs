//! Open Synthesis command line
//!
//! Local driver for the pipeline: grow a domain from literature sources,
//! synthesize answers, re-run validation on saved results and generate
//! multi-section papers.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use opensynthesis_common::{
    config::AppConfig,
    llm::{InferenceBackend, VllmClient},
    models::SynthesisResult,
    vectorstore::{build_vector_store, VectorStore},
};
use opensynthesis_context::{GenerationSlot, PaperPipeline, Synthesizer, Validator};
use opensynthesis_ingestion::{processor::DEFAULT_MAX_RESULTS_PER_SOURCE, CorpusManager, SourceRegistry};
use opensynthesis_search::HybridRetriever;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "opensynth",
    version,
    about = "RAG pipeline for synthesizing peer-reviewed scientific literature"
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest documents from data sources into the vector store
    Ingest {
        /// Search query for data sources
        query: String,
        /// Domain (collection) to add chunks to
        #[arg(long, default_value = "default")]
        domain: String,
        /// Comma-separated source names (default: all)
        #[arg(long, value_delimiter = ',')]
        sources: Option<Vec<String>>,
    },
    /// Run the synthesis pipeline on a research question
    Synthesize {
        question: String,
        #[arg(long, default_value = "default")]
        domain: String,
        /// Run validation passes
        #[arg(long, action = ArgAction::Set, default_value_t = true)]
        validate: bool,
        /// Save the result as JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Re-run validation on a saved synthesis result
    Validate {
        /// Synthesis result JSON written by `synthesize --output`
        input: PathBuf,
    },
    /// Generate a multi-section paper with per-section retrieval
    Paper {
        topic: String,
        #[arg(long, default_value = "default")]
        domain: String,
        #[arg(long, value_delimiter = ',')]
        sources: Option<Vec<String>>,
        /// Save the paper as markdown
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List available data sources
    Sources,
}

/// Long-lived clients and the engine built on them
struct Engine {
    store: Arc<dyn VectorStore>,
    backend: Arc<dyn InferenceBackend>,
    synthesizer: Arc<Synthesizer>,
}

impl Engine {
    fn new(config: &AppConfig) -> Result<Self> {
        let store = build_vector_store(&config.vector_store, &config.embedding)?;
        let backend: Arc<dyn InferenceBackend> =
            Arc::new(VllmClient::new(&config.backend, &config.inference)?);
        let retriever = Arc::new(HybridRetriever::from_config(store.clone(), &config.retrieval));
        let synthesizer = Arc::new(Synthesizer::new(
            retriever,
            backend.clone(),
            GenerationSlot::new(),
            config,
        ));
        Ok(Self {
            store,
            backend,
            synthesizer,
        })
    }

    async fn close(&self) {
        self.backend.close().await;
        self.store.close().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load_from(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest { query, domain, sources } => ingest(&config, &query, &domain, sources).await,
        Commands::Synthesize {
            question,
            domain,
            validate,
            output,
        } => synthesize(&config, &question, &domain, validate, output.as_deref()).await,
        Commands::Validate { input } => validate(&config, &input).await,
        Commands::Paper {
            topic,
            domain,
            sources,
            output,
        } => paper(&config, &topic, &domain, sources, output.as_deref()).await,
        Commands::Sources => {
            print!("{}", render_sources(&SourceRegistry::with_defaults()));
            Ok(())
        }
    }
}

async fn ingest(config: &AppConfig, query: &str, domain: &str, sources: Option<Vec<String>>) -> Result<()> {
    let store = build_vector_store(&config.vector_store, &config.embedding)?;
    let manager = CorpusManager::new(store.clone(), SourceRegistry::with_defaults());

    println!("Ingesting: {:?} into domain {}", query, domain);
    let report = manager
        .ingest_with(query, domain, sources.as_deref(), DEFAULT_MAX_RESULTS_PER_SOURCE)
        .await;
    store.close().await;

    let report = report?;
    println!(
        "Done. Ingested {} documents, {} chunks.",
        report.documents, report.chunks
    );
    Ok(())
}

async fn synthesize(
    config: &AppConfig,
    question: &str,
    domain: &str,
    validate: bool,
    output: Option<&Path>,
) -> Result<()> {
    let engine = Engine::new(config)?;
    println!("Synthesizing: {:?} from domain {}", question, domain);

    let result = run_synthesis(&engine, config, question, domain, validate).await;
    engine.close().await;
    let result = result?;

    println!("\nSynthesis complete.");
    if let Some(confidence) = result.confidence {
        println!("Confidence: {}", confidence);
    }
    if !result.hallucination_flags.is_empty() {
        println!("Hallucination flags: {:?}", result.hallucination_flags);
    }
    println!("\n{}", result.synthesis);

    if let Some(path) = output {
        write_json(path, &result)?;
        println!("\nSaved to {}", path.display());
    }
    Ok(())
}

async fn run_synthesis(
    engine: &Engine,
    config: &AppConfig,
    question: &str,
    domain: &str,
    validate: bool,
) -> Result<SynthesisResult> {
    let result = engine.synthesizer.synthesize(question, domain).await?;
    if !validate {
        return Ok(result);
    }
    let validator = Validator::new(engine.synthesizer.clone(), config.validation.clone());
    Ok(validator.validate(result).await?)
}

async fn validate(config: &AppConfig, input: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let result: SynthesisResult =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", input.display()))?;

    println!("Validating synthesis: {:?}", result.question);
    let engine = Engine::new(config)?;
    let validator = Validator::new(engine.synthesizer.clone(), config.validation.clone());
    let validated = validator.validate(result).await;
    engine.close().await;
    let validated = validated?;

    match validated.confidence {
        Some(confidence) => println!("Confidence: {}", confidence),
        None => println!("Confidence: unknown"),
    }
    if validated.hallucination_flags.is_empty() {
        println!("No hallucination flags.");
    } else {
        println!("Hallucination flags: {:?}", validated.hallucination_flags);
    }

    let output = validated_path(input);
    write_json(&output, &validated)?;
    println!("Saved to {}", output.display());
    Ok(())
}

async fn paper(
    config: &AppConfig,
    topic: &str,
    domain: &str,
    sources: Option<Vec<String>>,
    output: Option<&Path>,
) -> Result<()> {
    let engine = Engine::new(config)?;
    let corpus = Arc::new(
        CorpusManager::new(engine.store.clone(), SourceRegistry::with_defaults()).with_sources(sources),
    );
    let pipeline = PaperPipeline::new(engine.synthesizer.clone(), corpus);

    let result = pipeline.run(topic, domain).await;
    engine.close().await;
    let markdown = result?.to_markdown();

    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, markdown).with_context(|| format!("writing {}", path.display()))?;
            println!("\nSaved to {}", path.display());
        }
        None => println!("\n{}", markdown),
    }
    Ok(())
}

/// `result.json` -> `result.validated.json`
fn validated_path(input: &Path) -> PathBuf {
    input.with_extension("validated.json")
}

fn write_json(path: &Path, result: &SynthesisResult) -> Result<()> {
    let json = serde_json::to_string_pretty(result)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}

fn render_sources(registry: &SourceRegistry) -> String {
    let mut rows = registry.info();
    rows.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = format!("{:<18} {:<10} {:<6} {}\n", "NAME", "TYPE", "AUTH", "DESCRIPTION");
    for (name, info) in rows {
        let auth = if info.auth_required { "yes" } else { "no" };
        out.push_str(&format!(
            "{:<18} {:<10} {:<6} {}\n",
            name, info.data_type, auth, info.description
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ingest_sources() {
        let cli = Cli::parse_from([
            "opensynth", "ingest", "psilocybin depression", "--domain", "psych", "--sources",
            "openalex,crossref",
        ]);
        match cli.command {
            Commands::Ingest { query, domain, sources } => {
                assert_eq!(query, "psilocybin depression");
                assert_eq!(domain, "psych");
                assert_eq!(sources, Some(vec!["openalex".to_string(), "crossref".to_string()]));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_synthesize_validates_by_default() {
        let cli = Cli::parse_from(["opensynth", "synthesize", "q", "--config", "custom.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(cli.command, Commands::Synthesize { validate: true, .. }));

        let cli = Cli::parse_from(["opensynth", "synthesize", "q", "--validate", "false"]);
        assert!(matches!(cli.command, Commands::Synthesize { validate: false, .. }));
    }

    #[test]
    fn test_validated_path() {
        assert_eq!(
            validated_path(Path::new("out/result.json")),
            PathBuf::from("out/result.validated.json")
        );
    }

    #[test]
    fn test_saved_result_reloads() {
        let dir = std::env::temp_dir().join(format!("opensynth-cli-{}", std::process::id()));
        tokio_test::assert_ok!(std::fs::create_dir_all(&dir));
        let path = dir.join("result.json");

        let result = SynthesisResult::new("q", "psych", "Answer [SOURCE 1].", Vec::new());
        tokio_test::assert_ok!(write_json(&path, &result));

        let raw = tokio_test::assert_ok!(std::fs::read_to_string(&path));
        let loaded: SynthesisResult = tokio_test::assert_ok!(serde_json::from_str(&raw));
        assert_eq!(loaded.synthesis, "Answer [SOURCE 1].");
        assert_eq!(loaded.domain, "psych");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_render_sources_sorted() {
        let table = render_sources(&SourceRegistry::with_defaults());
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[0].starts_with("NAME"));
        assert!(lines[1].starts_with("crossref"));
        assert!(lines[2].starts_with("openalex"));
        assert!(lines[3].starts_with("semantic_scholar"));
    }
}

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use quarry_core::{OutputFormat, QuarryConfig, QueryRequest, ScoredResult, Trajectory};
use quarry_index::{CorpusStore, FunctionIndex};
use quarry_search::arxiv::fetch_arxiv_context;
use quarry_search::fanout::search_many;
use quarry_search::llm::LlmClient;

#[derive(Parser)]
#[command(
    name = "quarry",
    version,
    about = "Natural-language search over extracted code corpora",
    long_about = "Quarry searches pre-extracted function corpora with natural language,\n\
                   ranking results with an LLM when a provider key is configured and\n\
                   falling back to deterministic keyword scoring when it is not.\n\n\
                   Examples:\n  \
                     quarry search 'graph diameter computation'   Search all corpora\n  \
                     quarry search 'tokenizer' --experiments nlp  Search one corpus\n  \
                     quarry research 'streaming graph analysis'   Propose research directions\n  \
                     quarry repos                                 List available corpora"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .quarry.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,
}

#[derive(Subcommand)]
enum Command {
    /// Search corpora for functions relevant to a query
    #[command(long_about = "Search corpora for functions relevant to a natural-language query.\n\n\
        Runs the two-tier cascade per corpus (LLM semantic ranking with keyword\n\
        fallback) concurrently across all selected corpora and merges the results\n\
        into one globally ranked list.\n\n\
        Examples:\n  quarry search 'shortest path algorithm'\n  \
        quarry search 'attention mechanism' --arxiv https://arxiv.org/abs/1706.03762\n  \
        quarry search 'config parsing' --experiments tooling_v1 --show-code")]
    Search {
        /// Natural-language search query
        query: String,

        /// Corpus identifiers to search (default: all available)
        #[arg(long, num_args = 1..)]
        experiments: Vec<String>,

        /// Maximum results the semantic tier is asked for
        #[arg(long)]
        limit: Option<usize>,

        /// arXiv paper URL fetched and included as ranking context
        #[arg(long)]
        arxiv: Option<String>,

        /// Free-text context included in the ranking prompt
        #[arg(long)]
        context: Option<String>,

        /// Show full code for every result instead of snippets
        #[arg(long)]
        show_code: bool,
    },
    /// Generate research trajectory proposals from search results
    #[command(long_about = "Generate research trajectory proposals.\n\n\
        Searches the selected corpora for the query, then asks the LLM for\n\
        structured research directions grounded in the top-ranked functions.\n\
        Requires a provider API key; without one the list is empty.\n\n\
        Examples:\n  quarry research 'incremental graph algorithms'\n  \
        quarry research 'fast tokenization' --count 5")]
    Research {
        /// Research question or direction
        query: String,

        /// Corpus identifiers to draw from (default: all available)
        #[arg(long, num_args = 1..)]
        experiments: Vec<String>,

        /// Number of trajectories to request
        #[arg(long)]
        count: Option<usize>,

        /// Also generate prototype code for the Nth trajectory (1-based)
        #[arg(long, value_name = "N")]
        prototype: Option<usize>,
    },
    /// List available corpus identifiers
    Repos,
    /// Create a default .quarry.toml configuration file
    #[command(long_about = "Create a default .quarry.toml configuration file.\n\n\
        Generates a commented template with all available options.\n\
        Fails if .quarry.toml already exists.")]
    Init,
}

const DEFAULT_CONFIG: &str = r#"# Quarry Configuration

[llm]
# provider = "openai"            # or "openrouter"
# model = "gpt-4-turbo"
# fallback_model = "openai/gpt-3.5-turbo"   # openrouter only: retried once
# api_key resolves from OPENAI_API_KEY / OPENROUTER_API_KEY when unset
# base_url = "https://api.openai.com/v1"

[corpus]
# Directory containing *_extracted.json corpus files
# data_dir = "corpus"

[search]
# limit = 10
# functions_per_repo = 50
# trajectories = 3
# worker_timeout_secs = 120
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => QuarryConfig::from_file(path).into_diagnostic()?,
        None => {
            let default_path = std::path::Path::new(".quarry.toml");
            if default_path.exists() {
                QuarryConfig::from_file(default_path).into_diagnostic()?
            } else {
                QuarryConfig::default()
            }
        }
    };

    match cli.command {
        None => {
            print_welcome();
            Ok(())
        }
        Some(Command::Search {
            query,
            experiments,
            limit,
            arxiv,
            context,
            show_code,
        }) => {
            run_search(
                &config, cli.format, query, experiments, limit, arxiv, context, show_code,
            )
            .await
        }
        Some(Command::Research {
            query,
            experiments,
            count,
            prototype,
        }) => run_research(&config, cli.format, query, experiments, count, prototype).await,
        Some(Command::Repos) => {
            let store = CorpusStore::new(&config.corpus.data_dir);
            let experiments = store.experiments();
            match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&experiments).into_diagnostic()?
                    );
                }
                OutputFormat::Text => {
                    if experiments.is_empty() {
                        println!(
                            "No corpora found in {}. Point [corpus].data_dir at a directory of *_extracted.json files.",
                            config.corpus.data_dir.display()
                        );
                    } else {
                        println!("Available corpora ({}):", experiments.len());
                        for id in experiments {
                            println!("  {id}");
                        }
                    }
                }
            }
            Ok(())
        }
        Some(Command::Init) => {
            let path = std::path::Path::new(".quarry.toml");
            if path.exists() {
                miette::bail!(".quarry.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .quarry.toml with default configuration");
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!("quarry v{version} - natural-language search over extracted code corpora\n");
    println!("Quick start:");
    println!("  quarry init                     Create a .quarry.toml config file");
    println!("  quarry repos                    List available corpora");
    println!("  quarry search 'your query'      Search all corpora\n");
    println!("All commands:");
    println!("  search    Rank functions relevant to a query (LLM with keyword fallback)");
    println!("  research  Propose research trajectories from ranked results");
    println!("  repos     List available corpus identifiers");
    println!("  init      Create default configuration\n");
    println!("Run 'quarry <command> --help' for details.");
}

fn select_experiments(store: &CorpusStore, requested: Vec<String>) -> Result<Vec<String>> {
    let experiments = if requested.is_empty() {
        store.experiments()
    } else {
        requested
    };
    if experiments.is_empty() {
        miette::bail!(miette::miette!(
            help = "Extract functions from repositories first, then point [corpus].data_dir at them.",
            "No corpora found in {}",
            store.data_dir().display()
        ));
    }
    Ok(experiments)
}

fn spinner(message: &str) -> Option<indicatif::ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    pb.set_style(
        indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
            .expect("spinner template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Some(pb)
}

#[allow(clippy::too_many_arguments)]
async fn run_search(
    config: &QuarryConfig,
    format: OutputFormat,
    query: String,
    experiments: Vec<String>,
    limit: Option<usize>,
    arxiv: Option<String>,
    context: Option<String>,
    show_code: bool,
) -> Result<()> {
    let store = CorpusStore::new(&config.corpus.data_dir);
    let experiments = select_experiments(&store, experiments)?;

    let mut request =
        QueryRequest::new(&query).with_limit(limit.unwrap_or(config.search.limit));
    if let Some(text) = context {
        request = request.with_context(text);
    } else if let Some(url) = &arxiv {
        match fetch_arxiv_context(url).await {
            Ok(block) => request = request.with_context(block),
            Err(err) => warn!(url = %url, error = %err, "continuing without arXiv context"),
        }
    }

    let pb = spinner(&format!(
        "Searching {} corpora for '{query}'...",
        experiments.len()
    ));
    let results = search_many(&store, &experiments, &request, config).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&results).into_diagnostic()?
            );
        }
        OutputFormat::Text => print_results(&results, show_code),
    }
    Ok(())
}

fn print_results(results: &[ScoredResult], show_code: bool) {
    if results.is_empty() {
        println!("No matching functions found.");
        return;
    }

    println!(
        "Found {} relevant functions across repositories:",
        results.len()
    );
    for (i, result) in results.iter().enumerate() {
        println!(
            "\n{}. {} ({}) [{}]",
            i + 1,
            result.record.function_name,
            result.record.repo_name,
            result.experiment
        );
        match &result.explanation {
            Some(why) => {
                println!("   Relevance: {}/10", result.relevance_score);
                println!("   Why: {why}");
            }
            None => println!("   Keyword matches: {}", result.relevance_score),
        }

        if result.record.code.is_empty() {
            continue;
        }
        if show_code {
            println!("\n   Code:\n   {}", indent(&result.record.code));
        } else if i < 3 {
            let snippet = if result.record.code.len() > 200 {
                format!("{}...", &result.record.code[..snippet_cut(&result.record.code)])
            } else {
                result.record.code.clone()
            };
            println!("\n   Code snippet:\n   {}", indent(&snippet));
        }
    }
}

fn snippet_cut(code: &str) -> usize {
    code.char_indices()
        .take_while(|(i, _)| *i <= 200)
        .last()
        .map_or(0, |(i, _)| i)
}

fn indent(code: &str) -> String {
    code.replace('\n', "\n   ")
}

async fn run_research(
    config: &QuarryConfig,
    format: OutputFormat,
    query: String,
    experiments: Vec<String>,
    count: Option<usize>,
    prototype: Option<usize>,
) -> Result<()> {
    let store = CorpusStore::new(&config.corpus.data_dir);
    let experiments = select_experiments(&store, experiments)?;
    let count = count.unwrap_or(config.search.trajectories);

    let request = QueryRequest::new(&query).with_limit(20);
    let pb = spinner("Ranking functions for the research question...");
    let ranked = search_many(&store, &experiments, &request, config).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if ranked.is_empty() {
        println!("No relevant functions found for this research query.");
        return Ok(());
    }

    let client = LlmClient::from_config(&config.llm).into_diagnostic()?;
    if client.is_none() {
        println!(
            "No provider API key configured ({} unset); cannot generate trajectories.",
            config.llm.credential_env_vars().join(" / ")
        );
        return Ok(());
    }

    let pb = spinner("Generating research trajectories...");
    let trajectories = quarry_trajectory::synthesize(client.as_ref(), &query, &ranked, count)
        .await
        .into_diagnostic()?;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&trajectories).into_diagnostic()?
            );
        }
        OutputFormat::Text => print_trajectories(&trajectories),
    }

    if let Some(n) = prototype {
        let Some(trajectory) = n.checked_sub(1).and_then(|i| trajectories.get(i)) else {
            miette::bail!(
                "--prototype {n} is out of range: {} trajectories were generated",
                trajectories.len()
            );
        };
        let Some(client) = client.as_ref() else {
            return Ok(());
        };

        // Resolve existing components against the records that backed the
        // trajectories.
        let index = FunctionIndex::new(ranked.iter().map(|r| r.record.clone()).collect());
        let pb = spinner(&format!("Generating prototype for '{}'...", trajectory.title));
        let code = quarry_trajectory::generate_prototype(client, trajectory, &index)
            .await
            .into_diagnostic()?;
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        println!("\n--- Prototype: {} ---\n{code}", trajectory.title);
    }
    Ok(())
}

fn print_trajectories(trajectories: &[Trajectory]) {
    if trajectories.is_empty() {
        println!("Failed to generate research trajectories.");
        return;
    }

    println!("Generated {} research trajectories:", trajectories.len());
    for (i, t) in trajectories.iter().enumerate() {
        println!("\n{}. {}", i + 1, t.title);
        println!("   Core Question: {}", t.core_question);
        println!("   Rationale: {}", t.rationale);
        if !t.existing_components.is_empty() {
            println!("   Existing Components: {}", t.existing_components.join(", "));
        }
        if !t.new_components.is_empty() {
            println!("   New Components: {}", t.new_components.join(", "));
        }
        for challenge in &t.challenges {
            println!("   Challenge: {challenge}");
        }
        if !t.evaluation.is_empty() {
            println!("   Evaluation: {}", t.evaluation);
        }
    }
}

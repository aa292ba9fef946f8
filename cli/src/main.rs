//! product-graph CLI: reads and compiles product graphs against a terminology server
//!
//! Uses the terminology-sdk RemoteClient and, when configured, the remote
//! name generator.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use product_graph::{
    CompilationContext, CompilerConfig, CreationSequencer, GraphAssembler, NameGenerationService, PackageDetails,
    ProductGraph, RemoteNameGenerator,
};
use terminology_sdk::{RemoteClient, RemoteOptions};

#[derive(Parser)]
#[command(name = "product-graph", version, about = "Product graph compiler CLI")]
struct Cli {
    /// Compiler configuration (YAML or JSON)
    #[arg(long, global = true, env = "PRODUCT_GRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Branch to work on, overriding the configuration
    #[arg(long, global = true)]
    branch: Option<String>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the product graph of an existing package
    Read {
        /// Package concept id
        package_id: String,
    },
    /// Compile package details into a product graph
    Create {
        /// Package details as JSON
        details: PathBuf,

        /// Write new concepts to the terminology server
        #[arg(long)]
        commit: bool,
    },
    /// Print the effective configuration as YAML
    Config,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let result = match load_config(&cli) {
        Ok(config) => match cli.command {
            Commands::Read { ref package_id } => run_read(&config, package_id, &cli.format).await,
            Commands::Create { ref details, commit } => run_create(&config, details, commit, &cli.format).await,
            Commands::Config => run_config(&config),
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<CompilerConfig> {
    let mut config = match &cli.config {
        Some(path) => CompilerConfig::from_path(path)?,
        None => CompilerConfig::default(),
    };
    if let Some(branch) = &cli.branch {
        config.branch = branch.clone();
    }
    config.validate()?;
    Ok(config)
}

fn context(config: &CompilerConfig) -> anyhow::Result<CompilationContext> {
    let options = RemoteOptions {
        timeout: config.terminology.timeout(),
        stated_ecl: config.model.execute_ecl_as_stated,
        max_batch_checks: config.terminology.max_batch_checks,
        batch_check_delay: config.terminology.batch_check_delay(),
        identifier_service_url: config.terminology.identifier_service_url.clone(),
    };
    let client = RemoteClient::with_options(&config.terminology.base_url, options)?;
    let mut ctx = CompilationContext::from_config(config, Arc::new(client));
    if config.naming.base_url.is_some() {
        let generator = RemoteNameGenerator::new(&config.naming)?;
        ctx = ctx.with_naming(NameGenerationService::new(Arc::new(generator)));
    }
    Ok(ctx)
}

async fn run_read(
    config: &CompilerConfig,
    package_id: &str,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let graph = GraphAssembler::new(context(config)?).read(package_id).await?;
    print_graph(&graph, format)
}

async fn run_create(
    config: &CompilerConfig,
    details: &PathBuf,
    commit: bool,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let details: PackageDetails = serde_json::from_str(&std::fs::read_to_string(details)?)?;
    let ctx = context(config)?;
    let graph = GraphAssembler::new(ctx.clone()).create(details).await?;
    if !commit {
        return print_graph(&graph, format);
    }

    let (graph, report) = CreationSequencer::new(ctx).commit(graph).await?;
    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({ "graph": graph, "report": report });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            print_graph(&graph, format)?;
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Placeholder", "Concept"]);
            for (placeholder, id) in &report.placeholder_mapping {
                table.add_row(vec![placeholder.to_string(), id.clone()]);
            }
            println!("{}", table);
            println!(
                "{} created, {} edited, {} retired, {} member(s) added, {} removed",
                report.created.len(),
                report.edited.len(),
                report.retired.len(),
                report.members_created,
                report.members_removed
            );
        }
    }
    Ok(())
}

fn run_config(config: &CompilerConfig) -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}

fn print_graph(graph: &ProductGraph, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(graph)?);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Label", "Concept", "State", "Fully specified name"]);
            for node in graph.nodes() {
                table.add_row(vec![
                    node.label.clone(),
                    node.concept_id.to_string(),
                    node_state(node).to_string(),
                    node.fsn().unwrap_or_default().to_string(),
                ]);
            }
            println!("{}", table);

            let mut edges = Table::new();
            edges.set_content_arrangement(ContentArrangement::Dynamic);
            edges.set_header(vec!["Source", "Edge", "Target"]);
            for edge in graph.edges() {
                edges.add_row(vec![edge.source.to_string(), edge.label.to_string(), edge.target.to_string()]);
            }
            println!("{}", edges);
            println!("{} node(s), {} edge(s)", graph.node_count(), graph.edges().len());
        }
    }
    Ok(())
}

fn node_state(node: &product_graph::Node) -> &'static str {
    if node.is_concept_edit() {
        "edit"
    } else if node.is_retire_and_replace() {
        "retire and replace"
    } else if node.is_new_concept() {
        "new"
    } else if node.is_property_update() {
        "property update"
    } else {
        "existing"
    }
}

#![forbid(unsafe_code)]

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use value_space::copilot::{Copilot, CopilotConfig};
use value_space::dashboard::{render_cluster_details, render_hypotheses, render_rankings};
use value_space::gateway::{ProviderGateway, TracingUsageSink};
use value_space::{default_taxonomy, GeneratorConfig, GroupKey, ProductConfig, Session, Taxonomy};

#[derive(Parser)]
#[command(name = "value-space", version, about = "Synthetic product value space CLI")]
struct Cli {
    #[command(flatten)]
    generation: GenerationArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GenerationArgs {
    /// Generator config JSON; unset fields keep their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Product config JSON used instead of the built-in taxonomy
    #[arg(long, global = true)]
    product_config: Option<PathBuf>,
    #[arg(long, global = true)]
    seed: Option<u64>,
    /// Number of signals
    #[arg(long, global = true)]
    count: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize a generation and write its signals as JSON lines
    Generate {
        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print groups ranked by summed impact
    Rank {
        #[arg(long, value_parser = parse_group_key, default_value = "cluster")]
        by: GroupKey,
    },
    /// Print details for one cluster
    Inspect {
        #[arg(long)]
        cluster: String,
    },
    /// Ask the generative backend for a product config
    Product {
        #[arg(long)]
        description: String,
        #[arg(long)]
        out: PathBuf,
    },
    /// Ask the generative backend for hypotheses about a cluster
    Hypotheses {
        #[arg(long)]
        cluster: String,
        #[arg(long)]
        product: String,
    },
}

fn parse_group_key(s: &str) -> Result<GroupKey, String> {
    GroupKey::from_str(s)
        .ok_or_else(|| format!("unknown grouping '{s}' (expected job, segment, context or cluster)"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { out } => {
            let session = build_session(&cli.generation)?;
            let generation = session.current()?;
            let sink: Box<dyn Write> = match out {
                Some(path) => Box::new(File::create(path)?),
                None => Box::new(io::stdout().lock()),
            };
            let mut sink = BufWriter::new(sink);
            for signal in &generation.signals {
                let line = serde_json::to_string(signal)?;
                writeln!(sink, "{line}")?;
            }
            sink.flush()?;
        }
        Commands::Rank { by } => {
            let session = build_session(&cli.generation)?;
            let scores = session.rankings(by)?;
            print!("{}", render_rankings(by, &scores));
        }
        Commands::Inspect { cluster } => {
            let session = build_session(&cli.generation)?;
            let details = session
                .cluster_details(&cluster)?
                .ok_or_else(|| format!("no cluster named '{cluster}' in this generation"))?;
            print!("{}", render_cluster_details(&details));
        }
        Commands::Product { description, out } => {
            if description.trim().is_empty() {
                return Err("--description must not be empty".into());
            }
            let copilot = build_copilot()?;
            let config = copilot.generate_product_config(&description).await?;
            // Reject configs the engine could not use before writing them.
            config.clone().into_taxonomy()?;
            fs::write(&out, serde_json::to_string_pretty(&config)?)?;
            println!(
                "wrote product config '{}' ({} clusters) to {}",
                config.product_name,
                config.clusters.len(),
                out.display()
            );
        }
        Commands::Hypotheses { cluster, product } => {
            let copilot = build_copilot()?;
            let set = copilot.try_generate_hypotheses(&cluster, &product).await?;
            print!("{}", render_hypotheses(&cluster, &set));
        }
    }

    Ok(())
}

fn build_session(args: &GenerationArgs) -> Result<Session, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => serde_json::from_str::<GeneratorConfig>(&fs::read_to_string(path)?)?,
        None => GeneratorConfig::default(),
    };
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if let Some(count) = args.count {
        config = config.with_count(count);
    }

    let taxonomy = match &args.product_config {
        Some(path) => Arc::new(load_product_config(path)?),
        None => default_taxonomy(),
    };
    Ok(Session::new(taxonomy, config)?)
}

fn load_product_config(path: &Path) -> Result<Taxonomy, Box<dyn std::error::Error>> {
    let product: ProductConfig = serde_json::from_str(&fs::read_to_string(path)?)?;
    Ok(product.into_taxonomy()?)
}

fn build_copilot() -> Result<Copilot, Box<dyn std::error::Error>> {
    let gateway = ProviderGateway::from_env(Arc::new(TracingUsageSink))?;
    Ok(Copilot::new(Arc::new(gateway), CopilotConfig::from_env()))
}

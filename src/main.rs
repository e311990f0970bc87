use anyhow::{Context, Result};
use bratlink::corpus::{Corpus, CorpusConfig};
use bratlink::reader::ReaderConfig;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "bratlink")]
#[command(about = "Links brat standoff annotations to the words of their text files")]
#[command(version)]
struct Args {
    /// Directory holding .ann/.txt pairs (or .xml files with --from-xml)
    root_dir: PathBuf,

    /// Scan subdirectories too
    #[arg(long)]
    recursive: bool,

    /// Load documents previously exported as XML instead of standoff pairs
    #[arg(long)]
    from_xml: bool,

    /// Write every loaded document as XML into this directory
    #[arg(long)]
    export_xml: Option<PathBuf>,

    /// Abort on first error
    #[arg(long)]
    fail_fast: bool,

    /// Documents parsed concurrently (default: number of CPUs)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Read buffer size in bytes
    #[arg(long, default_value_t = 8192)]
    buffer_size: usize,

    /// Suppress console progress bars
    #[arg(long)]
    no_progress: bool,

    /// Stats output file path
    #[arg(long, default_value = "run_stats.json")]
    stats_out: PathBuf,
}

fn progress_bar(enabled: bool) -> Result<Option<ProgressBar>> {
    if !enabled {
        return Ok(None);
    }
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
        .progress_chars("#>-");
    pb.set_style(style);
    Ok(Some(pb))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .json()
        .init();

    let args = Args::parse();

    info!("Starting bratlink");
    info!(?args, "Parsed CLI arguments");

    if !args.root_dir.exists() {
        anyhow::bail!("Root directory does not exist: {}", args.root_dir.display());
    }

    if !args.root_dir.is_dir() {
        anyhow::bail!("Root path is not a directory: {}", args.root_dir.display());
    }

    let mut config = CorpusConfig {
        fail_fast: args.fail_fast,
        recursive: args.recursive,
        reader: ReaderConfig {
            buffer_size: args.buffer_size,
        },
        ..Default::default()
    };
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency.max(1);
    }

    let corpus = if args.from_xml {
        Corpus::load_xml(&args.root_dir, config)
            .await
            .context("Failed to import XML corpus")?
    } else {
        let pb = progress_bar(!args.no_progress)?;
        let corpus = Corpus::load_with_progress(&args.root_dir, config, |stats, total| {
            if let Some(ref pb) = pb {
                pb.set_length(total as u64);
                pb.set_message(stats.key.clone());
                pb.inc(1);
            }
        })
        .await
        .context("Failed to load corpus")?;
        if let Some(pb) = pb {
            pb.finish_with_message("done");
        }
        corpus
    };

    let stats = corpus.stats();
    println!("bratlink v{} - corpus loaded", env!("CARGO_PKG_VERSION"));
    println!("  Documents loaded: {}", stats.documents_loaded);
    if stats.documents_skipped > 0 {
        println!("  Documents skipped (no text file): {}", stats.documents_skipped);
    }
    if stats.documents_failed > 0 {
        println!("  Documents failed: {}", stats.documents_failed);
    }
    println!("  Annotations: {}", stats.total_annotations);
    println!("  Word bindings: {}", stats.total_bindings);

    if let Some(ref dir) = args.export_xml {
        let written = corpus
            .export_xml(dir)
            .await
            .with_context(|| format!("Failed to export XML to {}", dir.display()))?;
        println!("  Exported {} documents to {}", written.len(), dir.display());
    }

    stats
        .save(&args.stats_out)
        .await
        .with_context(|| format!("Failed to write stats to {}", args.stats_out.display()))?;
    info!("Run stats written to {}", args.stats_out.display());

    Ok(())
}

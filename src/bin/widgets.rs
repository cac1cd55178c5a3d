//! Command-line front end for the widget pipeline.
//!
//! ```text
//! widgets [-n <widgets>] [-p <producers>] [-c <consumers>] [-k <bad ordinal>]
//! ```

use clap::Parser;
use tracing_subscriber::EnvFilter;
use widgetline::pipeline::DEFAULT_CAPACITY;
use widgetline::prelude::*;

/// Manufacture widgets with a pool of producers and consume them with a pool
/// of consumers, stopping production once the k-th widget turns out broken.
#[derive(Debug, Parser)]
#[command(name = "widgets", version, about)]
struct CliArgs {
    /// Number of widgets to manufacture
    #[arg(short = 'n', long = "widgets", default_value_t = 10)]
    widgets: u64,

    /// Number of producers
    #[arg(short = 'p', long = "producers", default_value_t = 1)]
    producers: usize,

    /// Number of consumers
    #[arg(short = 'c', long = "consumers", default_value_t = 1)]
    consumers: usize,

    /// Ordinal of the broken widget; values outside 1..=n mean none is broken
    #[arg(
        short = 'k',
        long = "bad",
        default_value_t = -1,
        allow_negative_numbers = true
    )]
    bad: i64,

    /// Capacity of the channel between producers and consumers
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    /// Produce nothing past the broken widget
    #[arg(long)]
    strict: bool,

    /// Count reports instead of printing them
    #[arg(short, long)]
    quiet: bool,
}

impl From<&CliArgs> for PipelineConfig {
    fn from(args: &CliArgs) -> Self {
        let policy = if args.strict {
            StopPolicy::Strict
        } else {
            StopPolicy::InFlight
        };

        PipelineConfig::new()
            .total_widgets(args.widgets)
            .producers(args.producers)
            .consumers(args.consumers)
            .bad_widget(args.bad)
            .capacity(args.capacity)
            .stop_policy(policy)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    let pipeline = Pipeline::new(PipelineConfig::from(&args));

    let summary = if args.quiet {
        let counts = CountSink::new();
        let summary = pipeline.sink(counts.clone()).run().await?;
        tracing::info!(
            normal = counts.normal(),
            broken = counts.broken(),
            "reports counted"
        );
        summary
    } else {
        pipeline.sink(PrintSink::new()).run().await?
    };

    if !summary.is_complete() {
        anyhow::bail!("pipeline lost widgets: {}", summary);
    }
    Ok(())
}

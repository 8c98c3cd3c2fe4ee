use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::debug;

use chunk_series::backends::naming;
use chunk_series::notifier::{self, VerbosityLevel};
use chunk_series::pipeline::DEFAULT_CHUNKER_IMAGE;
use chunk_series::{
    report, Analyzer, Notifier, PodmanBackend, SeriesBuilder, SeriesConfig, SortMode, TagQuery,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Verbose mode (-v for info, -vv for debug, -vvv for trace)"
    )]
    verbose: u8,

    #[arg(
        long,
        global = true,
        env = "CHUNK_SERIES_PODMAN",
        default_value = "podman",
        help = "podman program to run"
    )]
    podman: String,

    #[arg(
        long,
        global = true,
        env = "CHUNK_SERIES_SKOPEO",
        default_value = "skopeo",
        help = "skopeo program to run"
    )]
    skopeo: String,
}

#[derive(Subcommand)]
enum Command {
    /// Compare sequential images and report layer sharing statistics
    Analyze(AnalyzeArgs),
    /// Pull images from a registry, run chunkah on each, store results
    BuildSeries(BuildSeriesArgs),
}

#[derive(Args)]
struct AnalyzeArgs {
    #[arg(help = "containers-storage prefix (e.g., localhost/fcos-chunked)")]
    prefix: String,

    #[arg(long, help = "Output as JSON")]
    json: bool,

    #[arg(long, help = "Show which components changed in each update")]
    show_components: bool,

    #[arg(
        long,
        help = "Also analyze original images ({prefix}-orig) for comparison"
    )]
    compare_originals: bool,
}

#[derive(Args)]
struct BuildSeriesArgs {
    #[arg(help = "OCI image repository (e.g., quay.io/fedora/fedora-coreos)")]
    repo: String,

    #[arg(long, default_value = "*", help = "Glob pattern for tag filtering")]
    tag_filter: String,

    #[arg(long, value_enum, default_value = "version", help = "How to sort tags")]
    sort_by: SortMode,

    #[arg(
        long,
        help = "Maximum number of images to process (takes the N most recent)"
    )]
    limit: Option<usize>,

    #[arg(long, help = "Storage prefix (default: derived from repo name)")]
    prefix: Option<String>,

    #[arg(
        long,
        env = "CHUNKAH_IMAGE",
        default_value = DEFAULT_CHUNKER_IMAGE,
        help = "Chunkah image to use"
    )]
    chunkah_image: String,

    #[arg(long, help = "Show what would be processed without doing it")]
    dry_run: bool,

    #[arg(long, help = "Overwrite existing images at prefix")]
    force: bool,

    #[arg(
        long,
        help = "Also store original (un-chunked) images as {prefix}-orig:N"
    )]
    keep_originals: bool,

    #[arg(
        last = true,
        help = "Additional arguments to pass to chunkah (after --)"
    )]
    chunkah_args: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    // Setup logging based on verbosity level; the backend logs commands through `log`.
    notifier::log_builder(
        VerbosityLevel::from(cli.verbose),
        notifier::env_filters().as_deref(),
    )
    .init();

    let notifier = Notifier::new(cli.verbose);
    debug!("podman: {}, skopeo: {}", cli.podman, cli.skopeo);

    let backend = PodmanBackend::with_programs(&cli.podman, &cli.skopeo)
        .context("Failed to initialize podman backend")?;

    match cli.command {
        Command::Analyze(args) => analyze(backend, notifier, args),
        Command::BuildSeries(args) => build_series(backend, notifier, args),
    }
}

fn analyze(backend: PodmanBackend, notifier: Notifier, args: AnalyzeArgs) -> Result<()> {
    let analyzer = Analyzer::new(backend, notifier);
    let report = analyzer.analyze(&args.prefix, args.compare_originals)?;

    if args.json {
        println!("{}", report::render_json(&report)?);
    } else {
        println!("{}", report::render_human(&report, args.show_components));
    }
    Ok(())
}

fn build_series(backend: PodmanBackend, notifier: Notifier, args: BuildSeriesArgs) -> Result<()> {
    let query = TagQuery {
        filter: args.tag_filter,
        sort: args.sort_by,
        limit: args.limit,
    };
    let config = SeriesConfig {
        prefix: args
            .prefix
            .unwrap_or_else(|| naming::default_prefix(&args.repo)),
        repo: args.repo,
        chunker_image: args.chunkah_image,
        chunker_args: args.chunkah_args,
        keep_originals: args.keep_originals,
        force: args.force,
        dry_run: args.dry_run,
    };

    let builder = SeriesBuilder::new(backend, notifier);
    builder.build(&query, &config)?.into_result()?;
    Ok(())
}

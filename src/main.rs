use anyhow::Context;
use clap::Parser;
use s3mirror::{parse_selectors, stderr_is_terminal, Mirror, MirrorConfig, S3Options, S3Store};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "s3mirror")]
#[command(about = "Mirror selected prefixes of an S3 bucket onto the local filesystem", long_about = None)]
#[command(version)]
struct Args {
    /// Bucket to mirror from
    #[arg(short, long)]
    bucket: String,

    /// Path selector(s) under the prefix; repeat the flag or pass one per line
    #[arg(short, long = "path", required = true, num_args = 1..)]
    paths: Vec<String>,

    /// Shared prefix prepended to every path selector
    #[arg(long, default_value = "")]
    prefix: String,

    /// Directory to mirror into (defaults to the current directory)
    #[arg(short = 'C', long, default_value = ".")]
    directory: PathBuf,

    /// Maximum number of concurrent downloads
    #[arg(short = 'j', long, default_value_t = 16)]
    concurrency: usize,

    /// Maximum number of concurrent prefix listings
    #[arg(long, default_value_t = 8)]
    list_concurrency: usize,

    /// Verify downloaded bodies against single-part ETags (MD5)
    #[arg(long)]
    verify: bool,

    /// AWS region
    #[arg(long)]
    region: Option<String>,

    /// Custom endpoint for S3-compatible stores
    #[arg(long)]
    endpoint_url: Option<String>,

    /// AWS profile name
    #[arg(long)]
    profile: Option<String>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Logs go to stderr so --json output stays clean
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("s3mirror={}", log_level))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args).await {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let selectors = parse_selectors(&args.paths);
    if selectors.is_empty() {
        anyhow::bail!("At least one non-empty path selector must be specified");
    }

    info!("🚀 s3mirror");
    info!("Bucket: {}", args.bucket);
    info!("Prefix: {:?}", args.prefix);
    info!("Paths: {:?}", selectors);
    info!("Output directory: {:?}", args.directory);

    let store = S3Store::connect(&S3Options {
        region: args.region,
        endpoint_url: args.endpoint_url,
        profile: args.profile,
    })
    .await;

    let config = MirrorConfig {
        bucket: args.bucket,
        prefix: args.prefix,
        selectors,
        working_dir: args.directory,
        max_concurrent_listings: args.list_concurrency,
        max_concurrent_downloads: args.concurrency,
        verify_checksums: args.verify,
        show_progress: !args.no_progress && !args.json && stderr_is_terminal(),
    };

    let summary = Mirror::new(Arc::new(store), config)
        .run()
        .await
        .with_context(|| "Mirror failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!(
            "✅ Total files written: {} ({} skipped)",
            summary.files_written, summary.skipped
        );
    }
    Ok(())
}

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use rangefetch::{
    download_segmented, probe_resource, Approach, CancelFlag, DownloadTarget, NetConfig,
    RetryPolicy,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ApproachArg {
    Auto,
    Thread,
    Size,
    Quantity,
}

impl From<ApproachArg> for Approach {
    fn from(arg: ApproachArg) -> Self {
        match arg {
            ApproachArg::Auto => Approach::Auto,
            ApproachArg::Thread => Approach::Thread,
            ApproachArg::Size => Approach::Size,
            ApproachArg::Quantity => Approach::Quantity,
        }
    }
}

/// Segmented HTTP downloader with resume and per-segment retry
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL of the resource to download
    url: String,

    /// Destination file path
    #[arg(short, long, default_value = "download.bin")]
    output: PathBuf,

    /// Segmentation strategy
    #[arg(long, value_enum, default_value_t = ApproachArg::Auto)]
    approach: ApproachArg,

    /// Strategy parameter: segment count, size in bytes, or worker target
    #[arg(long)]
    segment_param: Option<u64>,

    /// Maximum number of segments in flight at once
    #[arg(long, default_value_t = 8)]
    max_concurrent: usize,

    /// Attempts per segment, including the first
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Delay between attempts (e.g. "150ms", "2s")
    #[arg(long, default_value = "150ms", value_parser = humantime::parse_duration)]
    retry_delay: Duration,

    /// Keep existing destination bytes and fetch only the missing ranges
    #[arg(long)]
    resume: bool,

    /// Print the outcome as JSON instead of human-readable text
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        "rangefetch=debug"
    } else {
        "rangefetch=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = NetConfig {
        max_concurrent_segments: args.max_concurrent,
        ..NetConfig::default()
    };

    let client = config.build_client()?;
    let metadata = probe_resource(&client, &args.url)
        .await
        .context("failed to probe resource")?;

    info!(
        url = %args.url,
        size = ?metadata.total_size,
        ranges = metadata.supports_ranges,
        "🚀 starting download"
    );

    // A live bar only makes sense on a terminal with a known total, and it
    // would interleave with JSON output.
    let bar = match metadata.total_size {
        Some(total) if atty::is(atty::Stream::Stderr) && !args.json => {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
                    )?
                    .progress_chars("#>-"),
            );
            Some(pb)
        }
        _ => None,
    };

    let mut target = DownloadTarget::new(args.url, args.output);
    target.approach = args.approach.into();
    target.segment_param = args.segment_param;
    target.resumable = args.resume;
    target.retry = RetryPolicy {
        max_attempts: args.retries,
        delay_between_attempts: args.retry_delay,
        ..RetryPolicy::default()
    };
    if let Some(pb) = bar.clone() {
        target.progress_callback = Some(Box::new(move |total| pb.set_position(total)));
    }

    let cancel = CancelFlag::new();
    let ctrl_c_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("cancellation requested, stopping segments");
            ctrl_c_flag.cancel();
        }
    });

    let outcome = download_segmented(&config, target, cancel).await?;

    if let Some(pb) = bar {
        pb.finish_and_clear();
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if outcome.success {
        println!("✅ downloaded {} bytes", outcome.bytes_written);
    } else {
        println!(
            "❌ download incomplete: {} failed segment(s)",
            outcome.failed_segments.len()
        );
        for segment in &outcome.failed_segments {
            println!(
                "  segment {} ({}-{}): {}",
                segment.index,
                segment.start_offset,
                segment.end_offset,
                segment.last_error.as_deref().unwrap_or("unknown error")
            );
        }
        println!("re-run with --resume to retry only the missing ranges");
    }

    if !outcome.success {
        std::process::exit(1);
    }
    Ok(())
}

use std::path::PathBuf;
use std::time::Duration;

use bcrypt_validator::{BANNER, block_on_with_grace, default_output_path};
use bcrypt_verifier::{
    DEFAULT_QUEUE_CAPACITY, DEFAULT_SHUTDOWN_GRACE, DEFAULT_WORKERS, Error, Pipeline,
    PipelineConfig, ResultSink, TargetPassword, load_file,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bcrypt-validator", version)]
#[command(about = "Check one password against a file of bcrypt hashes")]
#[command(before_help = BANNER)]
struct Args {
    /// Input file with one `identifier,hash` record per line
    #[arg(short, long)]
    input: PathBuf,

    /// Password to verify against every hash
    #[arg(short, long)]
    password: String,

    /// Maximum number of records to verify (default: all)
    #[arg(short, long)]
    count: Option<usize>,

    /// Result file (default: <input name>_result.txt in the working directory)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of verification workers
    #[arg(short = 't', long, visible_alias = "thread", default_value_t = DEFAULT_WORKERS)]
    threads: usize,

    /// Records buffered between the loader and the workers
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Verify on a single thread without the worker pool
    #[arg(long)]
    sequential: bool,

    /// Seconds to wait for running comparisons after Ctrl-C or SIGTERM
    #[arg(long, default_value_t = DEFAULT_SHUTDOWN_GRACE.as_secs())]
    grace_secs: u64,

    /// Disable progress bar
    #[arg(long)]
    no_progress: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Error> {
    let args = Args::parse();
    setup_logging(args.verbose);

    let config = PipelineConfig::default()
        .with_workers(args.threads)
        .with_queue_capacity(args.queue_capacity)
        .with_shutdown_grace(Duration::from_secs(args.grace_secs))
        .with_signal_handling(true);
    config.validate()?;

    // The pipeline has already spent the grace period on in-flight
    // comparisons by the time it returns; anything left is abandoned.
    block_on_with_grace(run(args, config), Duration::ZERO)?
}

async fn run(args: Args, config: PipelineConfig) -> Result<(), Error> {
    print!("{BANNER}");
    let output = args.output.clone().unwrap_or_else(|| default_output_path(&args.input));
    println!("Output file name: {}", output.display());

    let loaded = load_file(&args.input, args.count)?;
    println!("Loaded {} password records", loaded.len());
    if loaded.skipped > 0 {
        info!(skipped = loaded.skipped, "skipped malformed lines");
    }

    let pipeline = Pipeline::new(config, ResultSink::create(&output)?)?;
    let password = TargetPassword::new(&args.password);
    let total = loaded.len() as u64;

    let progress_bar = if !args.no_progress && total > 0 {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    // Spawn progress updater task
    let progress_counter = pipeline.progress();
    let progress_bar_clone = progress_bar.clone();
    let progress_task = tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let current = progress_counter.load(std::sync::atomic::Ordering::Relaxed);
            if let Some(ref pb) = progress_bar_clone {
                pb.set_position(current);
            }
            if current >= total {
                break;
            }
        }
    });

    let stats = if args.sequential {
        info!("Running sequentially");
        pipeline.run_sequential(&password, &loaded)
    } else {
        pipeline.run(&password, loaded).await
    };

    progress_task.abort();
    if let Some(pb) = progress_bar {
        pb.finish_with_message(if stats.interrupted { "interrupted" } else { "done" });
    }

    // Workers are done or detached; release the result file.
    pipeline.finish();

    if stats.interrupted {
        println!("Program exiting...");
    }
    println!(
        "Verifying {} passwords took {:.1} seconds",
        stats.loaded,
        stats.elapsed.as_secs_f64()
    );
    println!(
        "{} verified, {} matched, {} written to {}",
        stats.verified,
        stats.matched,
        stats.written,
        output.display()
    );
    if stats.write_failures > 0 {
        println!("{} matches could not be written", stats.write_failures);
    }

    Ok(())
}

fn setup_logging(verbose: bool) {
    let default = if verbose {
        "bcrypt_validator=debug,bcrypt_verifier=debug,warn"
    } else {
        "bcrypt_validator=info,bcrypt_verifier=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

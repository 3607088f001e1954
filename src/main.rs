//! corner-heal - Batch object removal for photos
//!
//! CLI entry point

use anyhow::{Context, Result};
use clap::Parser;
use corner_heal::{
    collect_image_files, exit_codes, read_sources, result_entries, ArchiveError, BatchEngine,
    Cli, Commands, Config, EngineError, HttpEditClient, ImageStatus, InfoArgs,
    NoopProgress, OutputMode, ProcessArgs, ProgressCallback, RunKind, RunOutcome, RunProgress,
    RunSummary, SourceImage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::Level;

#[cfg(feature = "web")]
use corner_heal::{CliOverrides, ServeArgs, ServerConfig, WebServer};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Process(args) => run_process(&args),
        Commands::Info(args) => run_info(&args).map(|()| exit_codes::SUCCESS),
        #[cfg(feature = "web")]
        Commands::Serve(args) => run_serve(&args).map(|()| exit_codes::SUCCESS),
    };

    std::process::exit(match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_codes::GENERAL_ERROR
        }
    });
}

fn init_logging(mode: OutputMode) {
    let level = match mode {
        OutputMode::Quiet => Level::ERROR,
        OutputMode::Normal => Level::WARN,
        OutputMode::Verbose => Level::INFO,
        OutputMode::VeryVerbose => Level::DEBUG,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the config file (explicit path or default location)
///
/// A file that cannot be read falls back to defaults with a warning.
fn load_config(path: Option<&Path>) -> Config {
    let loaded = match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    loaded.unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config file: {}", e);
        Config::default()
    })
}

// ============ Progress Callback Implementations ============

/// Progress bar for interactive runs
struct BarProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl BarProgress {
    fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }
}

impl ProgressCallback for BarProgress {
    fn on_run_start(&self, kind: RunKind, total: usize) {
        let style = ProgressStyle::with_template(
            "{prefix:>12} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");

        let bar = ProgressBar::new(total as u64).with_style(style);
        bar.set_prefix(kind.to_string());
        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(bar);
        }
    }

    fn on_image_start(&self, name: &str, _index: usize, _total: usize) {
        if let Ok(slot) = self.bar.lock() {
            if let Some(bar) = slot.as_ref() {
                bar.set_message(name.to_string());
            }
        }
    }

    fn on_image_complete(&self, name: &str, status: &ImageStatus, progress: RunProgress) {
        if let Ok(slot) = self.bar.lock() {
            if let Some(bar) = slot.as_ref() {
                if let ImageStatus::Error(message) = status {
                    bar.println(format!("  {}: {}", name, message));
                }
                bar.set_position(progress.processed as u64);
            }
        }
    }

    fn on_run_complete(&self, _summary: &RunSummary) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }
}

/// Line-per-image output for verbose runs
struct VerboseProgress;

impl ProgressCallback for VerboseProgress {
    fn on_run_start(&self, kind: RunKind, total: usize) {
        println!("Starting {} ({} images)", kind, total);
    }

    fn on_image_start(&self, name: &str, index: usize, total: usize) {
        println!("[{}/{}] Processing: {}", index + 1, total, name);
    }

    fn on_image_complete(&self, _name: &str, status: &ImageStatus, progress: RunProgress) {
        match status {
            ImageStatus::Done(result) => println!(
                "    Done ({}, {} bytes) {}",
                result.tool,
                result.bytes.len(),
                corner_heal::progress::format_progress(&progress)
            ),
            ImageStatus::Error(message) => println!("    Error: {}", message),
            _ => {}
        }
    }
}

fn progress_callback(mode: OutputMode) -> Arc<dyn ProgressCallback> {
    match mode {
        OutputMode::Quiet => Arc::new(NoopProgress),
        OutputMode::Normal => Arc::new(BarProgress::new()),
        OutputMode::Verbose | OutputMode::VeryVerbose => Arc::new(VerboseProgress),
    }
}

// ============ Process Command ============

fn run_process(args: &ProcessArgs) -> Result<i32> {
    let mode = args.output_mode();
    init_logging(mode);

    if let Some(missing) = args.inputs.iter().find(|input| !input.exists()) {
        eprintln!("Error: Input path does not exist: {}", missing.display());
        return Ok(exit_codes::INPUT_NOT_FOUND);
    }

    let files = collect_image_files(&args.inputs).context("Failed to read input directory")?;
    if files.is_empty() {
        eprintln!("Error: No supported images found (png, jpg, jpeg, webp)");
        return Ok(exit_codes::INPUT_NOT_FOUND);
    }

    let config = load_config(args.config.as_deref()).merge_with_cli(&args.overrides());

    if args.dry_run {
        print_execution_plan(args, &files, &config);
        return Ok(exit_codes::SUCCESS);
    }

    let client = HttpEditClient::with_timeout(&config.client.endpoint, config.client.timeout())
        .context("Failed to create image-editing client")?;
    let engine = BatchEngine::with_selection(Arc::new(client), config.selection())
        .with_callback(progress_callback(mode));

    let sources = read_sources(&files).context("Failed to read input images")?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(process_batch(engine, sources, args, &config))
}

async fn process_batch(
    engine: BatchEngine,
    sources: Vec<SourceImage>,
    args: &ProcessArgs,
    config: &Config,
) -> Result<i32> {
    let mode = args.output_mode();
    engine.load(sources).await?;

    let outcome = engine.process_all().await?;
    report_run(&outcome, mode);

    for round in 1..=args.retry_failed {
        if !engine.has_errors().await {
            break;
        }
        if mode.should_show(OutputMode::Verbose) {
            println!("Retry round {}/{}", round, args.retry_failed);
        }
        let outcome = engine.retry_failed().await;
        report_run(&outcome, mode);
    }

    write_outputs(&engine, args, config).await
}

fn report_run(outcome: &RunOutcome, mode: OutputMode) {
    if let Some(summary) = outcome.summary() {
        if mode.should_show(OutputMode::Normal) {
            corner_heal::progress::print_summary(summary);
        }
    }
}

/// Write results, report failures, and pick the exit code
async fn write_outputs(engine: &BatchEngine, args: &ProcessArgs, config: &Config) -> Result<i32> {
    let snapshot = engine.snapshot().await;

    if let Some(dir) = &args.output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        for (name, result) in result_entries(&snapshot.images) {
            let path = dir.join(&name);
            std::fs::write(&path, &result.bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
    }

    if let Some(path) = &args.archive {
        let path = archive_path(path, &config.output.archive_name);
        match engine.build_archive().await {
            Ok(data) => {
                std::fs::write(&path, data)
                    .with_context(|| format!("Failed to write archive {}", path.display()))?;
                if args.output_mode().should_show(OutputMode::Normal) {
                    println!("Archive written: {}", path.display());
                }
            }
            Err(EngineError::Archive(ArchiveError::EmptyResultSet)) => {
                eprintln!("Warning: No processed images to archive");
            }
            Err(e) => return Err(e).context("Failed to build archive"),
        }
    }

    let failed: Vec<_> = snapshot
        .images
        .iter()
        .filter_map(|image| image.failure_message().map(|message| (image.name(), message)))
        .collect();
    if failed.is_empty() {
        return Ok(exit_codes::SUCCESS);
    }

    eprintln!("{} image(s) failed:", failed.len());
    for (name, message) in &failed {
        eprintln!("  {}: {}", name, message);
    }
    Ok(exit_codes::PARTIAL_FAILURE)
}

/// Resolve `--archive`: a directory gets the configured archive name
fn archive_path(path: &Path, archive_name: &str) -> PathBuf {
    if path.is_dir() {
        path.join(archive_name)
    } else {
        path.to_path_buf()
    }
}

/// Print execution plan for dry-run mode
fn print_execution_plan(args: &ProcessArgs, files: &[PathBuf], config: &Config) {
    println!("=== Dry Run - Execution Plan ===");
    println!();
    println!("Endpoint: {}", config.client.endpoint);
    match config.client.timeout_secs {
        Some(secs) => println!("Timeout:  {}s", secs),
        None => println!("Timeout:  none"),
    }
    println!("Corner:   {}", config.defaults.corner);
    println!("Tool:     {}", config.defaults.tool);
    println!("Retries:  {} round(s) for failed images", args.retry_failed);
    if let Some(dir) = &args.output_dir {
        println!("Output:   {}", dir.display());
    }
    if let Some(path) = &args.archive {
        println!(
            "Archive:  {}",
            archive_path(path, &config.output.archive_name).display()
        );
    }
    println!();
    println!("Files to process: {}", files.len());
    for (i, file) in files.iter().enumerate() {
        println!("  {}. {}", i + 1, file.display());
    }
}

// ============ Info Command ============

fn run_info(args: &InfoArgs) -> Result<()> {
    let config = load_config(args.config.as_deref());

    println!("corner-heal v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Config File:");
    match (&args.config, Config::default_path()) {
        (Some(path), _) => println!("  {}", path.display()),
        (None, Some(path)) if path.exists() => println!("  {}", path.display()),
        (None, Some(path)) => println!("  {} (not found, using defaults)", path.display()),
        (None, None) => println!("  (no config directory on this platform)"),
    }
    println!();
    println!("Image-Editing Service:");
    println!("  Endpoint: {}", config.client.endpoint);
    match config.client.timeout_secs {
        Some(secs) => println!("  Timeout:  {}s", secs),
        None => println!("  Timeout:  none"),
    }
    println!();
    println!("Defaults:");
    println!("  Corner:  {}", config.defaults.corner);
    println!("  Tool:    {}", config.defaults.tool);
    println!("  Archive: {}", config.output.archive_name);

    Ok(())
}

// ============ Serve Command (Web Server) ============

#[cfg(feature = "web")]
fn run_serve(args: &ServeArgs) -> Result<()> {
    init_logging(OutputMode::Verbose);

    let overrides = CliOverrides {
        endpoint: args.endpoint.clone(),
        ..CliOverrides::new()
    };
    let config = load_config(args.config.as_deref()).merge_with_cli(&overrides);

    let mut server_config = ServerConfig::default()
        .with_port(args.port)
        .with_bind(&args.bind);
    if let Some(limit) = args.upload_limit_mb {
        server_config = server_config.with_upload_limit(limit * 1024 * 1024);
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(async {
        let server = WebServer::from_config(server_config, &config)?;
        server.run().await
    })?;

    Ok(())
}

//! The generation run: configuration, collaborators, dispatch, summary.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cli::Cli;
use crate::cli::output::get_formatter;
use crate::error::PipelineError;
use crate::models::{Config, OutputFormat};
use crate::pipeline::{Collaborators, Dispatcher, Ledger, PipelineOptions, collect_candidates};
use crate::services::{ChatGenerator, DocumentExtractor, codec_from_config};
use crate::utils::logging;

pub async fn handle_run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    let formatter = get_formatter(cli.format);

    let mut options = PipelineOptions::from_config(
        &config,
        &cli.data_directory,
        &cli.output_path,
        cli.filetype,
        cli.force,
    );

    if cli.dry_run {
        logging::init(None, cli.verbose);
        if !options.data_directory.is_dir() {
            return Err(PipelineError::DataDirectory(options.data_directory).into());
        }

        let processed = if options.force {
            HashSet::new()
        } else {
            Ledger::new(options.ledger_path())
                .load()
                .context("failed to read ledger")?
        };
        let candidates = collect_candidates(
            &options.data_directory,
            &processed,
            options.force,
            &options.exclude_patterns,
        )?;
        print!("{}", formatter.format_candidates(&candidates));
        return Ok(());
    }

    // The log file lives in the output directory, so it must exist first.
    std::fs::create_dir_all(&options.output_path).with_context(|| {
        format!(
            "failed to create output directory {}",
            options.output_path.display()
        )
    })?;
    logging::init(
        Some(&options.output_path.join(&config.pipeline.log_file)),
        cli.verbose,
    );

    let generator =
        ChatGenerator::new(&config.generation).context("failed to create QA generator")?;
    let codec = codec_from_config(&config.chunking).context("failed to load tokenizer")?;

    options.show_progress = cli.format == OutputFormat::Text;
    tracing::info!(
        "starting run: data={}, output={}, filetype={}, workers={}, chunk size={}, force={}",
        options.data_directory.display(),
        options.output_path.display(),
        options.encoding,
        options.workers,
        options.chunk_size,
        options.force
    );

    let dispatcher = Dispatcher::new(
        options,
        Collaborators {
            extractor: Arc::new(DocumentExtractor::new()),
            codec,
            generator: Arc::new(generator),
        },
    );
    let stats = dispatcher.run().await?;

    tracing::info!(
        "run finished: {} processed, {} skipped, {} failed, {} records in {}ms",
        stats.processed,
        stats.skipped,
        stats.failed,
        stats.records,
        stats.duration_ms
    );
    println!("{}", formatter.format_run_stats(&stats));
    Ok(())
}

/// Load configuration and apply command-line overrides.
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => Config::load().context("failed to load config")?,
    };

    if let Some(workers) = cli.workers {
        config.pipeline.workers = workers;
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.chunking.chunk_size = chunk_size;
    }
    config
        .pipeline
        .exclude_patterns
        .extend(cli.exclude.iter().cloned());

    config.validate().context("invalid configuration")?;
    Ok(config)
}

// src/actions/create.rs

//! The `create` action: dump databases into named pipes, write the
//! bootstrap manifest, then build the archive.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::actions::json::parse_json;
use crate::actions::ActionContext;
use crate::borg::commands::make_create_command;
use crate::borg::expand_archive_name;
use crate::cli::CreateArguments;
use crate::config::paths::expand_home;
use crate::errors::{BorgkeeperError, Result};
use crate::hooks::data_source::{dump_all, has_databases, remove_all};
use crate::system::hostname;

/// Contents of `{source_dir}/bootstrap/manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub borgkeeper_version: String,
    pub config_paths: Vec<String>,
}

pub fn manifest_path(source_directory: &Path) -> PathBuf {
    source_directory.join("bootstrap").join("manifest.json")
}

/// Reject flag combinations the engine can't honour together.
pub fn validate_create_arguments(args: &CreateArguments) -> Result<()> {
    if args.list_details && args.progress {
        return Err(BorgkeeperError::InvalidArguments(
            "With the create action, only one of --list and --progress flags can be used."
                .to_string(),
        ));
    }
    if args.list_details && args.json {
        return Err(BorgkeeperError::InvalidArguments(
            "With the create action, only one of --list and --json flags can be used.".to_string(),
        ));
    }
    Ok(())
}

fn write_manifest(source_directory: &Path, config_paths: &[PathBuf]) -> Result<()> {
    let path = manifest_path(source_directory);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let manifest = Manifest {
        borgkeeper_version: env!("CARGO_PKG_VERSION").to_string(),
        config_paths: config_paths
            .iter()
            .map(|p| p.display().to_string())
            .collect(),
    };
    fs::write(&path, serde_json::to_string(&manifest)?)?;
    debug!(path = %path.display(), "wrote bootstrap manifest");
    Ok(())
}

pub async fn run_create(ctx: ActionContext<'_>, args: &CreateArguments) -> Result<Vec<Value>> {
    let config = ctx.config;
    let dry_run = ctx.global.dry_run;
    let source_directory = expand_home(&config.borgmatic_source_directory);

    info!(
        "{}: Creating archive{}",
        ctx.log_prefix,
        if dry_run { " (dry run; not making any changes)" } else { "" }
    );

    let store_config = config.store_config_files && !ctx.config_paths.is_empty();
    if store_config && !dry_run {
        write_manifest(&source_directory, ctx.config_paths)?;
    }

    let data_sources = ctx.data_sources();
    remove_all(data_sources)?;

    let result = create_archive(ctx, args, &source_directory, store_config).await;

    // Dumps are removed whether or not the archive was created.
    let cleanup = remove_all(data_sources);
    let output = result?;
    cleanup?;

    match output {
        Some(output) if args.json => Ok(parse_json(&output, ctx.repository)?.into_iter().collect()),
        _ => Ok(Vec::new()),
    }
}

async fn create_archive(
    ctx: ActionContext<'_>,
    args: &CreateArguments,
    source_directory: &Path,
    store_config: bool,
) -> Result<Option<String>> {
    let config = ctx.config;
    let processes = dump_all(ctx.data_sources()).await?;
    let streaming = !processes.is_empty();

    let mut sources: Vec<String> = config
        .source_directories
        .iter()
        .map(|s| expand_home(s).display().to_string())
        .collect();
    if has_databases(config) || store_config {
        sources.push(source_directory.display().to_string());
    }
    if store_config {
        sources.extend(ctx.config_paths.iter().map(|p| p.display().to_string()));
    }

    let archive_name = expand_archive_name(&config.archive_name_format, &hostname(), Local::now());
    let argv = make_create_command(
        config,
        ctx.repository_path(),
        &archive_name,
        &sources,
        streaming,
        args,
        ctx.global,
    );

    let mut spec = ctx.engine_command(argv);
    if args.json {
        spec = spec.capture_output();
    }
    ctx.runner.execute_with_processes(&spec, processes, false).await
}

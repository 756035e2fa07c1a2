// src/actions/config.rs

//! `config bootstrap|generate|validate|show`. These work on configuration
//! files rather than repositories, so they run outside the per-repository
//! pipeline.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::actions::archive::resolve_archive_name;
use crate::actions::create::{manifest_path, Manifest};
use crate::borg::commands::{make_extract_paths_command, make_extract_to_stdout_command};
use crate::borg::make_environment;
use crate::cli::{
    BootstrapArguments, ConfigArguments, GenerateArguments, GlobalArguments, ValidateArguments,
};
use crate::config::generate::generate_sample_configuration;
use crate::config::loader::{load_configurations, render_configuration};
use crate::config::model::{Configuration, DEFAULT_SOURCE_DIRECTORY};
use crate::config::paths::expand_home;
use crate::errors::{BorgkeeperError, Result};
use crate::exec::{CommandRunner, CommandSpec, ExitCodePolicy};
use crate::types::{LogLevel, LogRecord};

/// Run a config action, returning records for the run summary.
pub async fn run_config_action(
    runner: &dyn CommandRunner,
    global: &GlobalArguments,
    args: &ConfigArguments,
    config_paths: &[PathBuf],
) -> Result<Vec<LogRecord>> {
    match args {
        ConfigArguments::Bootstrap(bootstrap) => {
            run_bootstrap(runner, global, bootstrap).await?;
            Ok(Vec::new())
        }
        ConfigArguments::Generate(generate) => run_generate(generate),
        ConfigArguments::Validate(validate) => run_validate(global, validate, config_paths),
        ConfigArguments::Show => run_show(global, config_paths),
    }
}

/// Archive paths are stored relative to `/`.
fn archive_path(path: &Path) -> String {
    path.display().to_string().trim_start_matches('/').to_string()
}

/// Extract the configuration files recorded in an archive's manifest.
async fn run_bootstrap(
    runner: &dyn CommandRunner,
    global: &GlobalArguments,
    args: &BootstrapArguments,
) -> Result<()> {
    let config = Configuration {
        borgmatic_source_directory: args
            .source_directory
            .clone()
            .unwrap_or_else(|| DEFAULT_SOURCE_DIRECTORY.to_string()),
        ..Configuration::default()
    };
    let environment = make_environment(&config);
    let policy = ExitCodePolicy::from_config(&config);

    let archive = resolve_archive_name(runner, &config, &args.repository, &args.archive, global).await?;
    let manifest = manifest_path(&expand_home(&config.borgmatic_source_directory));

    let argv = make_extract_to_stdout_command(
        &config,
        &args.repository,
        &archive,
        &[archive_path(&manifest)],
        global,
    );
    let raw = runner
        .capture(&CommandSpec::new(argv).with_env(environment.clone()).exit_codes(policy.clone()))
        .await?;
    let manifest: Manifest = serde_json::from_str(raw.trim()).map_err(|err| {
        BorgkeeperError::ConfigError(format!(
            "Cannot read configuration paths from archive {archive} manifest: {err}"
        ))
    })?;
    if manifest.config_paths.is_empty() {
        return Err(BorgkeeperError::ConfigError(format!(
            "Archive {archive} lists no configuration files to bootstrap"
        )));
    }

    info!(
        "Bootstrapping config paths: {}",
        manifest.config_paths.join(", ")
    );
    let paths: Vec<String> = manifest
        .config_paths
        .iter()
        .map(|p| archive_path(Path::new(p)))
        .collect();
    let argv = make_extract_paths_command(
        &config,
        &args.repository,
        &archive,
        &paths,
        args.strip_components,
        args.progress,
        global,
    );
    let destination = args.destination.clone().unwrap_or_else(|| PathBuf::from("/"));
    runner
        .execute(
            &CommandSpec::new(argv)
                .with_env(environment)
                .exit_codes(policy)
                .working_directory(destination),
        )
        .await
}

fn run_generate(args: &GenerateArguments) -> Result<Vec<LogRecord>> {
    let destination = match &args.destination {
        Some(destination) => destination.clone(),
        None => dirs::config_dir()
            .map(|dir| dir.join("borgkeeper").join("config.yaml"))
            .ok_or_else(|| {
                BorgkeeperError::InvalidArguments(
                    "No user configuration directory; pass --destination".to_string(),
                )
            })?,
    };
    generate_sample_configuration(&destination, args.overwrite)?;
    Ok(vec![LogRecord::new(
        LogLevel::Info,
        format!(
            "Generated a sample configuration file at {}. Edit it to suit your needs.",
            destination.display()
        ),
    )])
}

fn run_validate(
    global: &GlobalArguments,
    args: &ValidateArguments,
    config_paths: &[PathBuf],
) -> Result<Vec<LogRecord>> {
    let (configs, mut records) = load_configurations(config_paths, &global.overrides)?;
    if config_paths.is_empty() {
        records.push(LogRecord::new(
            LogLevel::Critical,
            "No configuration files found",
        ));
    }
    if records.iter().any(|record| record.level == LogLevel::Critical) {
        return Ok(records);
    }

    if args.show {
        for loaded in &configs {
            print!("{}", render_configuration(&loaded.config)?);
        }
    }
    records.push(LogRecord::new(
        LogLevel::Info,
        "All configuration files are valid",
    ));
    Ok(records)
}

fn run_show(global: &GlobalArguments, config_paths: &[PathBuf]) -> Result<Vec<LogRecord>> {
    let (configs, records) = load_configurations(config_paths, &global.overrides)?;
    for loaded in &configs {
        if configs.len() > 1 {
            println!("# {}", loaded.path.display());
        }
        print!("{}", render_configuration(&loaded.config)?);
    }
    Ok(records)
}

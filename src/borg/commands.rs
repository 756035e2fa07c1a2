// src/borg/commands.rs

//! Pure builders turning configuration plus action arguments into engine
//! argument vectors.
//!
//! None of these touch the filesystem or spawn anything; the action handlers
//! wrap the returned argv in a [`crate::exec::CommandSpec`].

use crate::borg::flags::{
    common_flags, extra_options, make_flags, make_switch, repository_archive, verbosity_flags,
};
use crate::cli::{
    BreakLockArguments, CompactArguments, CreateArguments, ExportTarArguments, ExtractArguments,
    GlobalArguments, InfoArguments, ListArguments, MountArguments, PruneArguments,
    RepoCreateArguments, RepoInfoArguments, RepoListArguments, TransferArguments,
};
use crate::config::model::{CheckKind, Configuration};

fn base(config: &Configuration, verb: &str) -> Vec<String> {
    vec![config.local_path.clone(), verb.to_string()]
}

fn dry_run_flag(global: &GlobalArguments) -> Vec<String> {
    make_switch("dry_run", global.dry_run)
}

/// `borg create` for one repository.
///
/// `sources` are the configured source directories plus anything the run
/// adds (dump directory, bootstrap manifest, config files). `read_special`
/// is forced on while dumps are streamed through named pipes.
pub fn make_create_command(
    config: &Configuration,
    repository: &str,
    archive_name: &str,
    sources: &[String],
    streaming_dumps: bool,
    args: &CreateArguments,
    global: &GlobalArguments,
) -> Vec<String> {
    let mut command = base(config, "create");
    for pattern in &config.exclude_patterns {
        command.extend(make_flags("exclude", Some(pattern)));
    }
    command.extend(make_flags("compression", config.compression.as_deref()));
    command.extend(make_switch("one_file_system", config.one_file_system));
    command.extend(make_switch(
        "read_special",
        config.read_special || streaming_dumps,
    ));
    command.extend(common_flags(config, global));
    command.extend(make_switch("stats", args.stats && !global.dry_run && !args.json));
    if args.list_details {
        command.extend([
            "--list".to_string(),
            "--filter".to_string(),
            "AMEx-".to_string(),
        ]);
    }
    command.extend(make_switch("progress", args.progress));
    command.extend(make_switch("json", args.json));
    command.extend(dry_run_flag(global));
    command.extend(extra_options(config.extra_borg_options.create.as_deref()));
    command.push(repository_archive(repository, archive_name));
    command.extend(sources.iter().cloned());
    command
}

pub fn make_prune_command(
    config: &Configuration,
    repository: &str,
    args: &PruneArguments,
    global: &GlobalArguments,
) -> Vec<String> {
    let mut command = base(config, "prune");
    command.extend(make_flags("keep_within", config.keep_within.as_deref()));
    for (name, value) in [
        ("keep_secondly", config.keep_secondly),
        ("keep_minutely", config.keep_minutely),
        ("keep_hourly", config.keep_hourly),
        ("keep_daily", config.keep_daily),
        ("keep_weekly", config.keep_weekly),
        ("keep_monthly", config.keep_monthly),
        ("keep_yearly", config.keep_yearly),
    ] {
        command.extend(make_flags(name, value));
    }
    command.extend(common_flags(config, global));
    command.extend(make_switch("stats", args.stats && !global.dry_run));
    command.extend(make_switch("list", args.list_details));
    command.extend(dry_run_flag(global));
    command.extend(extra_options(config.extra_borg_options.prune.as_deref()));
    command.push(repository.to_string());
    command
}

pub fn make_compact_command(
    config: &Configuration,
    repository: &str,
    args: &CompactArguments,
    global: &GlobalArguments,
) -> Vec<String> {
    let mut command = base(config, "compact");
    command.extend(common_flags(config, global));
    command.extend(make_switch("progress", args.progress));
    command.extend(make_flags("threshold", args.threshold.or(config.compact_threshold)));
    command.extend(extra_options(config.extra_borg_options.compact.as_deref()));
    command.push(repository.to_string());
    command
}

/// Translate the requested check kinds into engine flags. Repository plus
/// archives is the engine's default and needs no flag.
fn check_flags(checks: &[CheckKind], check_last: Option<u32>) -> Vec<String> {
    let repository = checks.contains(&CheckKind::Repository);
    let data = checks.contains(&CheckKind::Data);
    let archives = checks.contains(&CheckKind::Archives) || data;

    let mut flags = Vec::new();
    match (repository, archives) {
        (true, false) => flags.push("--repository-only".to_string()),
        (false, true) => flags.push("--archives-only".to_string()),
        _ => {}
    }
    if data {
        flags.push("--verify-data".to_string());
    }
    if archives {
        flags.extend(make_flags("last", check_last));
    }
    flags
}

pub fn make_check_command(
    config: &Configuration,
    repository: &str,
    checks: &[CheckKind],
    repair: bool,
    progress: bool,
    global: &GlobalArguments,
) -> Vec<String> {
    let mut command = base(config, "check");
    command.extend(check_flags(checks, config.check_last));
    command.extend(make_switch("repair", repair));
    command.extend(common_flags(config, global));
    command.extend(make_switch("progress", progress));
    command.extend(extra_options(config.extra_borg_options.check.as_deref()));
    command.push(repository.to_string());
    command
}

pub fn make_extract_command(
    config: &Configuration,
    repository: &str,
    archive: &str,
    args: &ExtractArguments,
    global: &GlobalArguments,
) -> Vec<String> {
    let mut command = base(config, "extract");
    command.extend(common_flags(config, global));
    command.extend(dry_run_flag(global));
    command.extend(make_flags("strip_components", args.strip_components));
    command.extend(make_switch("progress", args.progress));
    command.extend(extra_options(config.extra_borg_options.extract.as_deref()));
    command.push(repository_archive(repository, archive));
    command.extend(args.paths.iter().cloned());
    command
}

/// `borg extract --stdout` for streaming a single dump or file out of an
/// archive.
pub fn make_extract_to_stdout_command(
    config: &Configuration,
    repository: &str,
    archive: &str,
    paths: &[String],
    global: &GlobalArguments,
) -> Vec<String> {
    let mut command = base(config, "extract");
    command.extend(common_flags(config, global));
    command.push("--stdout".to_string());
    command.push(repository_archive(repository, archive));
    command.extend(paths.iter().cloned());
    command
}

/// `borg extract` of whole paths, relative to the caller's working
/// directory.
pub fn make_extract_paths_command(
    config: &Configuration,
    repository: &str,
    archive: &str,
    paths: &[String],
    strip_components: Option<u32>,
    progress: bool,
    global: &GlobalArguments,
) -> Vec<String> {
    let mut command = base(config, "extract");
    command.extend(common_flags(config, global));
    command.extend(dry_run_flag(global));
    command.extend(make_flags("strip_components", strip_components));
    command.extend(make_switch("progress", progress));
    command.push(repository_archive(repository, archive));
    command.extend(paths.iter().cloned());
    command
}

pub fn make_export_tar_command(
    config: &Configuration,
    repository: &str,
    archive: &str,
    args: &ExportTarArguments,
    global: &GlobalArguments,
) -> Vec<String> {
    let mut command = base(config, "export-tar");
    command.extend(make_flags("tar_filter", args.tar_filter.as_deref()));
    command.extend(common_flags(config, global));
    command.extend(dry_run_flag(global));
    command.extend(make_flags("strip_components", args.strip_components));
    command.push(repository_archive(repository, archive));
    command.push(args.destination.clone());
    command.extend(args.paths.iter().cloned());
    command
}

pub fn make_mount_command(
    config: &Configuration,
    repository: &str,
    archive: Option<&str>,
    args: &MountArguments,
    global: &GlobalArguments,
) -> Vec<String> {
    let mut command = base(config, "mount");
    command.extend(common_flags(config, global));
    command.extend(make_switch("foreground", args.foreground));
    command.push(match archive {
        Some(archive) => repository_archive(repository, archive),
        None => repository.to_string(),
    });
    command.push(args.mount_point.display().to_string());
    command.extend(args.paths.iter().cloned());
    command
}

pub fn make_umount_command(
    local_path: &str,
    mount_point: &str,
    global: &GlobalArguments,
) -> Vec<String> {
    let mut command = vec![local_path.to_string(), "umount".to_string()];
    command.extend(verbosity_flags(global.verbosity_level()));
    command.push(mount_point.to_string());
    command
}

/// `borg list` of one archive's contents. JSON output is one object per
/// line.
pub fn make_list_command(
    config: &Configuration,
    repository: &str,
    archive: &str,
    args: &ListArguments,
    global: &GlobalArguments,
) -> Vec<String> {
    let mut command = base(config, "list");
    command.extend(common_flags(config, global));
    command.extend(make_switch("short", args.short && !args.json));
    command.extend(make_switch("json_lines", args.json));
    command.push(repository_archive(repository, archive));
    command.extend(args.paths.iter().cloned());
    command
}

/// `borg list` of archive paths matching `patterns`, used to discover dumps.
pub fn make_list_paths_command(
    config: &Configuration,
    repository: &str,
    archive: &str,
    patterns: &[String],
    global: &GlobalArguments,
) -> Vec<String> {
    let mut command = base(config, "list");
    command.extend(common_flags(config, global));
    command.push("--short".to_string());
    command.push(repository_archive(repository, archive));
    command.extend(patterns.iter().cloned());
    command
}

pub fn make_repo_list_command(
    config: &Configuration,
    repository: &str,
    args: &RepoListArguments,
    global: &GlobalArguments,
) -> Vec<String> {
    let mut command = base(config, "list");
    command.extend(common_flags(config, global));
    command.extend(make_switch("short", args.short && !args.json));
    command.extend(make_switch("json", args.json));
    command.push(repository.to_string());
    command
}

/// Archive names only, oldest first; the last line is the latest archive.
pub fn make_archive_names_command(
    config: &Configuration,
    repository: &str,
    global: &GlobalArguments,
) -> Vec<String> {
    let mut command = base(config, "list");
    command.extend(common_flags(config, global));
    command.push("--short".to_string());
    command.push(repository.to_string());
    command
}

pub fn make_repo_info_command(
    config: &Configuration,
    repository: &str,
    args: &RepoInfoArguments,
    global: &GlobalArguments,
) -> Vec<String> {
    let mut command = base(config, "info");
    command.extend(common_flags(config, global));
    command.extend(make_switch("json", args.json));
    command.push(repository.to_string());
    command
}

pub fn make_info_command(
    config: &Configuration,
    repository: &str,
    args: &InfoArguments,
    global: &GlobalArguments,
) -> Vec<String> {
    let mut command = base(config, "info");
    command.extend(common_flags(config, global));
    command.extend(make_switch("json", args.json));
    command.push(match args.archive.as_deref() {
        Some(archive) => repository_archive(repository, archive),
        None => repository.to_string(),
    });
    command
}

pub fn make_repo_create_command(
    config: &Configuration,
    repository: &str,
    encryption_mode: &str,
    args: &RepoCreateArguments,
    global: &GlobalArguments,
) -> Vec<String> {
    let mut command = base(config, "init");
    command.extend(make_flags("encryption", Some(encryption_mode)));
    command.extend(make_switch("append_only", args.append_only));
    command.extend(make_flags("storage_quota", args.storage_quota.as_deref()));
    command.extend(common_flags(config, global));
    command.extend(extra_options(config.extra_borg_options.repo_create.as_deref()));
    command.push(repository.to_string());
    command
}

pub fn make_transfer_command(
    config: &Configuration,
    repository: &str,
    args: &TransferArguments,
    global: &GlobalArguments,
) -> Vec<String> {
    let mut command = base(config, "transfer");
    command.extend(common_flags(config, global));
    command.extend(dry_run_flag(global));
    command.extend(make_flags("other_repo", Some(&args.source_repository)));
    command.extend(make_flags(
        "match_archives",
        args.archive.as_deref().or(args.match_archives.as_deref()),
    ));
    command.extend(make_flags("repo", Some(repository)));
    command
}

pub fn make_break_lock_command(
    config: &Configuration,
    repository: &str,
    _args: &BreakLockArguments,
    global: &GlobalArguments,
) -> Vec<String> {
    let mut command = base(config, "break-lock");
    command.extend(common_flags(config, global));
    command.push(repository.to_string());
    command
}

/// Arbitrary engine command. The repository travels in `BORG_REPO`; an
/// archive is spliced in after the subcommand as `::archive`.
pub fn make_passthrough_command(
    config: &Configuration,
    archive: Option<&str>,
    options: &[String],
) -> Vec<String> {
    let mut command = vec![config.local_path.clone()];
    let mut options = options.iter().cloned();
    if let Some(subcommand) = options.next() {
        command.push(subcommand);
    }
    if let Some(archive) = archive {
        command.push(format!("::{archive}"));
    }
    command.extend(options);
    command
}

// src/config/generate.rs

//! Sample configuration for `config generate`.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::errors::{BorgkeeperError, Result};

const SAMPLE_CONFIGURATION: &str = r#"# Directories to back up.
source_directories:
    - /home
    - /etc

# Repositories to back up to, processed in order. Either a path or a map
# with a path and a display label.
repositories:
    - path: ssh://user@backupserver/./sourcehostname.borg
      label: backupserver
    - path: /mnt/backup/sourcehostname.borg
      label: local

# Encryption passphrase handed to borg through its environment.
# encryption_passphrase: "!secret"

# Archive name; {hostname} and {now} placeholders are expanded.
# archive_name_format: "{hostname}-{now:%Y-%m-%dT%H:%M:%S.%f}"

# Retry a failing repository this many times, sleeping
# retry_wait * attempt seconds between attempts.
retries: 0
retry_wait: 0

# Retention policy for prune.
keep_daily: 7
keep_weekly: 4
keep_monthly: 6

# Consistency checks to run.
checks:
    - repository
    - archives

# Shell commands run at lifecycle points. Placeholders such as
# {repository} and {error} are filled in; exit code 75 skips the rest of
# the current repository without failing.
hooks:
    before_backup:
        - echo "Starting a backup."
    after_backup:
        - echo "Finished a backup."
    on_error:
        - 'echo "Error during {repository}: {error}"'

# Databases dumped into the archive before create.
# postgresql_databases:
#     - name: users
#       hostname: database.example.org

# Monitoring.
# healthchecks: https://hc-ping.com/your-uuid-here
"#;

/// Write the sample configuration to `destination`.
pub fn generate_sample_configuration(destination: &Path, overwrite: bool) -> Result<()> {
    if destination.exists() && !overwrite {
        return Err(BorgkeeperError::InvalidArguments(format!(
            "{} already exists; use --overwrite to replace it",
            destination.display()
        )));
    }

    if let Some(parent) = destination.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(destination, SAMPLE_CONFIGURATION)?;
    info!(destination = %destination.display(), "generated sample configuration");
    Ok(())
}

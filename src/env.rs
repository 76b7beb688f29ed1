//! The ambient GitHub Actions environment.

use crate::static_lazy_lock;

use std::{env, fs::OpenOptions, io::Write as _, path::PathBuf};

use tracing::warn;

static_lazy_lock! {
    /// The path to the webhook event payload file, when running under Actions.
    pub GITHUB_EVENT_PATH: Option<PathBuf> = env::var_os("GITHUB_EVENT_PATH").map(PathBuf::from);
}

static_lazy_lock! {
    /// The step-output file the runner collects `name=value` lines from.
    pub GITHUB_OUTPUT: Option<PathBuf> = env::var_os("GITHUB_OUTPUT").map(PathBuf::from);
}

static_lazy_lock! {
    /// The `owner/repo` slug of the repository this action runs in.
    pub GITHUB_REPOSITORY: Option<String> = env::var("GITHUB_REPOSITORY").ok();
}

/// Records a step output for later workflow steps.
///
/// Appends a `name=value` line to the runner's output file. Outside of
/// Actions (no `GITHUB_OUTPUT`) the output is logged and dropped.
///
/// # Errors
///
/// Returns an [`std::io::Error`] if the output file cannot be written.
pub fn set_output(name: &str, value: &str) -> std::io::Result<()> {
    let Some(path) = GITHUB_OUTPUT.as_deref() else {
        warn!("GITHUB_OUTPUT not set, dropping output {name}={value}");
        return Ok(());
    };

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{name}={value}")
}

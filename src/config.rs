//! Caller-supplied configuration.
//!
//! Inputs arrive the way the Actions runner delivers them: `INPUT_*`
//! environment variables for values declared in the action metadata, and a
//! `client_payload` inside the webhook event file for values forwarded by a
//! `repository_dispatch` trigger. Inputs win; the payload is the fallback.

use std::{collections::HashMap, env, fs, time::Duration};

use serde::Deserialize;

use crate::{
    env::GITHUB_EVENT_PATH,
    error::{RelayError, RelayResult},
};

/// The default delay between job status fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Mangles an input name into the environment variable the runner sets for it.
pub fn input_var_name(name: &str) -> String {
    format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
}

/// The set of `INPUT_*` variables visible to this invocation.
#[derive(Debug, Default)]
pub struct Inputs(HashMap<String, String>);

impl Inputs {
    /// Collects all action inputs from the process environment.
    pub fn from_env() -> Self {
        Self(
            env::vars()
                .filter(|(key, _)| key.starts_with("INPUT_"))
                .collect(),
        )
    }

    /// Builds an input set directly from `(name, value)` pairs.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(name, value)| (input_var_name(name), value.to_owned()))
                .collect(),
        )
    }

    /// Looks up an input by its declared name. Empty values count as absent,
    /// matching the runner's behavior for inputs without a default.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(&input_var_name(name))
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }
}

/// The `client_payload` of a `repository_dispatch` event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientPayload {
    pub pat: Option<String>,
    pub workflow_name: Option<String>,
    pub job_name: Option<String>,
    pub run_number: Option<u64>,
    pub package_name: Option<String>,
    pub package_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Event {
    client_payload: Option<ClientPayload>,
}

/// Reads the `client_payload` from the event file, if one is present.
pub fn load_client_payload() -> Option<ClientPayload> {
    let path = GITHUB_EVENT_PATH.as_deref()?;
    let text = fs::read_to_string(path).ok()?;
    serde_json::from_str::<Event>(&text).ok()?.client_payload
}

/// A destination or source repository slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub owner: String,
    pub repo: String,
}

impl Repository {
    /// Parses an `owner/repo` slug.
    pub fn parse(slug: &str) -> Option<Self> {
        let (owner, repo) = slug.split_once('/')?;
        if owner.is_empty() || repo.is_empty() {
            return None;
        }
        Some(Self {
            owner: owner.to_owned(),
            repo: repo.to_owned(),
        })
    }
}

/// One unit of a batch scan.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchTarget {
    pub repo: String,
    pub workflow: String,
    pub branch: String,
}

/// The single-run check this action was originally built around.
#[derive(Debug, Clone)]
pub struct RunTarget {
    pub repo: String,
    pub workflow: String,
    pub job: String,
    pub run_number: u64,
    pub package: String,
    pub version: Option<String>,
}

/// What the invocation should do.
#[derive(Debug, Clone)]
pub enum Mode {
    /// Verify and republish one package from one identified run.
    Single(RunTarget),
    /// Scan every run on the named branches of several repositories.
    Batch(Vec<BatchTarget>),
}

/// Fully resolved invocation configuration.
#[derive(Debug)]
pub struct Config {
    pub source_owner: String,
    pub source_token: String,
    pub registry_token: String,
    pub destination: Repository,
    pub allowed_branches: Vec<String>,
    pub poll_interval: Duration,
    pub poll_timeout: Option<Duration>,
    pub mode: Mode,
}

impl Config {
    /// Resolves the configuration from the process environment and the event file.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::MissingInput`] or [`RelayError::InvalidInput`]
    /// when a required value is absent or unparseable.
    pub fn from_env() -> RelayResult<Self> {
        Self::resolve(
            &Inputs::from_env(),
            load_client_payload(),
            crate::env::GITHUB_REPOSITORY.clone(),
        )
    }

    /// Resolves the configuration from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::MissingInput`] or [`RelayError::InvalidInput`]
    /// when a required value is absent or unparseable.
    pub fn resolve(
        inputs: &Inputs,
        payload: Option<ClientPayload>,
        default_repository: Option<String>,
    ) -> RelayResult<Self> {
        let payload = payload.unwrap_or_default();

        let source_owner = required(inputs.get("source-owner"), None, "source-owner")?;
        let source_token = required(
            inputs.get("source-token"),
            payload.pat.as_deref(),
            "source-token",
        )?;
        let registry_token = required(inputs.get("registry-token"), None, "registry-token")?;

        let destination = inputs
            .get("destination-repository")
            .map(str::to_owned)
            .or(default_repository)
            .ok_or_else(|| RelayError::MissingInput {
                name: String::from("destination-repository"),
            })
            .and_then(|slug| {
                Repository::parse(&slug).ok_or_else(|| RelayError::InvalidInput {
                    name: String::from("destination-repository"),
                    detail: format!("expected owner/repo, got {slug:?}"),
                })
            })?;

        let allowed_branches = inputs
            .get("permitted-branches")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|branch| !branch.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        let poll_interval = match inputs.get("poll-interval-seconds") {
            Some(value) => Duration::from_secs(parse_integer(value, "poll-interval-seconds")?),
            None => DEFAULT_POLL_INTERVAL,
        };
        let poll_timeout = inputs
            .get("poll-timeout-seconds")
            .map(|value| parse_integer(value, "poll-timeout-seconds").map(Duration::from_secs))
            .transpose()?;

        let mode = if let Some(targets) = inputs.get("targets") {
            let targets: Vec<BatchTarget> =
                serde_json::from_str(targets).map_err(|err| RelayError::InvalidInput {
                    name: String::from("targets"),
                    detail: err.to_string(),
                })?;
            Mode::Batch(targets)
        } else {
            let run_number = match inputs.get("run-number") {
                Some(value) => parse_integer(value, "run-number")?,
                None => payload.run_number.ok_or_else(|| RelayError::MissingInput {
                    name: String::from("run-number"),
                })?,
            };
            Mode::Single(RunTarget {
                repo: required(inputs.get("source-repo"), None, "source-repo")?,
                workflow: required(
                    inputs.get("workflow-name"),
                    payload.workflow_name.as_deref(),
                    "workflow-name",
                )?,
                job: required(
                    inputs.get("job-name"),
                    payload.job_name.as_deref(),
                    "job-name",
                )?,
                run_number,
                package: required(
                    inputs.get("package-name"),
                    payload.package_name.as_deref(),
                    "package-name",
                )?,
                version: inputs
                    .get("package-version")
                    .map(str::to_owned)
                    .or(payload.package_version),
            })
        };

        Ok(Self {
            source_owner,
            source_token,
            registry_token,
            destination,
            allowed_branches,
            poll_interval,
            poll_timeout,
            mode,
        })
    }

    /// Whether a run on the given branch may be processed.
    pub fn branch_permitted(&self, branch: &str) -> bool {
        self.allowed_branches.is_empty() || self.allowed_branches.iter().any(|b| b == branch)
    }
}

fn required(input: Option<&str>, fallback: Option<&str>, name: &str) -> RelayResult<String> {
    input
        .or(fallback)
        .map(str::to_owned)
        .ok_or_else(|| RelayError::MissingInput {
            name: name.to_owned(),
        })
}

fn parse_integer(value: &str, name: &str) -> RelayResult<u64> {
    value.parse().map_err(|_| RelayError::InvalidInput {
        name: name.to_owned(),
        detail: format!("expected an integer, got {value:?}"),
    })
}

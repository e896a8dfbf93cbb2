//! Runtime configuration.
//!
//! Values are layered: built-in defaults, then the optional JSON config file,
//! then flags/environment. The merged result is validated once so the
//! workflows never see a half-specified target.
use crate::cli::ConfigArgs;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SUGGEST_SNAPSHOT: &str = "suggestions/responses.json";
const DEFAULT_BALLOT_SNAPSHOT: &str = "ballots/responses.json";
const CONFIG_DIR_NAME: &str = "forms-rotate";

/// On-disk config file. Every field is optional; flags and env fill the gaps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub suggest_form_id: Option<String>,
    pub ballot_form_id: Option<String>,
    pub suggest_snapshot_path: Option<PathBuf>,
    pub ballot_snapshot_path: Option<PathBuf>,
    pub api_base: Option<String>,
    pub access_token: Option<String>,
    pub timeout_secs: Option<u64>,
    pub ballot_transform: Option<TransformConfig>,
    pub ballot_candidates: Option<Vec<CandidateLabel>>,
}

/// How the ballot form is derived from the suggestions snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformConfig {
    #[default]
    Identity,
    FeatureList(FeatureListConfig),
}

/// Suggestion-form question ids read by the feature-list transform. Only the
/// title is required; the others enrich each film's ballot label and blurb.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureListConfig {
    pub title_question_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_question_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_question_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_question_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes_question_id: Option<String>,
}

impl FeatureListConfig {
    pub fn titles_only(title_question_id: impl Into<String>) -> Self {
        Self {
            title_question_id: title_question_id.into(),
            ..Self::default()
        }
    }
}

/// Display name for one ranked ballot question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CandidateLabel {
    pub question_id: String,
    pub title: String,
}

/// Which configured form a command acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FormRole {
    Suggestions,
    Ballot,
}

/// A form id paired with the snapshot file that archives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormTarget {
    pub form_id: String,
    pub snapshot_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub suggestions: FormTarget,
    pub ballot: FormTarget,
    pub api_base: Option<String>,
    pub access_token: Option<String>,
    pub timeout: Duration,
    pub transform: TransformConfig,
    pub candidates: Vec<CandidateLabel>,
}

impl Config {
    pub fn target(&self, role: FormRole) -> &FormTarget {
        match role {
            FormRole::Suggestions => &self.suggestions,
            FormRole::Ballot => &self.ballot,
        }
    }

    /// The forms gateway base URL; required only once a remote client is built.
    pub fn require_api_base(&self) -> Result<&str> {
        self.api_base.as_deref().ok_or_else(|| {
            missing(
                "forms API base URL",
                "--api-base",
                "FORMS_API_BASE",
                "api_base",
            )
        })
    }

    /// The bearer token; required only once a remote client is built.
    pub fn require_access_token(&self) -> Result<&str> {
        self.access_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "missing access token (set --access-token, FORMS_ACCESS_TOKEN, or access_token in the config file)"
                )
            })
    }
}

/// Resolve the effective configuration from flags, env, and the config file.
pub fn load_config(args: &ConfigArgs) -> Result<Config> {
    let file = match config_file_path(args)? {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config file");
            read_config_file(&path)?
        }
        None => ConfigFile::default(),
    };
    let config = merge_config(file, args)?;
    validate_config(&config)?;
    Ok(config)
}

/// An explicit `--config` must exist; the per-user default is used only when present.
fn config_file_path(args: &ConfigArgs) -> Result<Option<PathBuf>> {
    if let Some(path) = &args.config {
        if !path.is_file() {
            return Err(anyhow!("config file {} not found", path.display()));
        }
        return Ok(Some(path.clone()));
    }
    Ok(default_config_path().filter(|path| path.is_file()))
}

/// `<config dir>/forms-rotate/config.json`, e.g. `~/.config/forms-rotate/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join("config.json"))
}

pub fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let file: ConfigFile = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config {}", path.display()))?;
    Ok(file)
}

fn merge_config(file: ConfigFile, args: &ConfigArgs) -> Result<Config> {
    let suggest_form_id = args
        .suggest_form_id
        .clone()
        .or(file.suggest_form_id)
        .ok_or_else(|| {
            missing(
                "suggestions form id",
                "--suggest-form-id",
                "SUGGEST_FORM_ID",
                "suggest_form_id",
            )
        })?;
    let ballot_form_id = args
        .ballot_form_id
        .clone()
        .or(file.ballot_form_id)
        .ok_or_else(|| {
            missing(
                "ballot form id",
                "--ballot-form-id",
                "BALLOTS_FORM_ID",
                "ballot_form_id",
            )
        })?;

    let transform = merge_transform(file.ballot_transform, args);
    let candidates = if args.candidates.is_empty() {
        file.ballot_candidates.unwrap_or_default()
    } else {
        args.candidates.clone()
    };

    Ok(Config {
        suggestions: FormTarget {
            form_id: suggest_form_id.trim().to_string(),
            snapshot_path: args
                .suggest_snapshot
                .clone()
                .or(file.suggest_snapshot_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SUGGEST_SNAPSHOT)),
        },
        ballot: FormTarget {
            form_id: ballot_form_id.trim().to_string(),
            snapshot_path: args
                .ballot_snapshot
                .clone()
                .or(file.ballot_snapshot_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BALLOT_SNAPSHOT)),
        },
        api_base: args
            .api_base
            .clone()
            .or(file.api_base)
            .map(|base| base.trim().to_string()),
        access_token: args.access_token.clone().or(file.access_token),
        timeout: Duration::from_secs(
            args.timeout_secs
                .or(file.timeout_secs)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        ),
        transform,
        candidates,
    })
}

/// `--title-question-id` switches to the feature-list transform. The other
/// question flags override the file's feature-list settings field by field.
fn merge_transform(file: Option<TransformConfig>, args: &ConfigArgs) -> TransformConfig {
    let file = file.unwrap_or_default();
    let mut feature_list = match (&args.title_question_id, file) {
        (Some(title), TransformConfig::FeatureList(mut from_file)) => {
            from_file.title_question_id = title.clone();
            from_file
        }
        (Some(title), TransformConfig::Identity) => FeatureListConfig::titles_only(title.as_str()),
        (None, TransformConfig::FeatureList(from_file)) => from_file,
        (None, TransformConfig::Identity) => return TransformConfig::Identity,
    };
    let overrides = [
        (&mut feature_list.year_question_id, &args.year_question_id),
        (&mut feature_list.runtime_question_id, &args.runtime_question_id),
        (&mut feature_list.pitch_question_id, &args.pitch_question_id),
        (&mut feature_list.notes_question_id, &args.notes_question_id),
    ];
    for (field, flag) in overrides {
        if flag.is_some() {
            field.clone_from(flag);
        }
    }
    TransformConfig::FeatureList(feature_list)
}

fn missing(what: &str, flag: &str, env: &str, key: &str) -> anyhow::Error {
    anyhow!("missing {what} (set {flag}, {env}, or {key} in the config file)")
}

/// Validate ids, paths, and limits of a merged config.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_form_id(&config.suggestions.form_id, "suggestions form id")?;
    validate_form_id(&config.ballot.form_id, "ballot form id")?;
    if config.suggestions.form_id == config.ballot.form_id {
        return Err(anyhow!(
            "suggestions and ballot form ids must differ (both are {:?})",
            config.suggestions.form_id
        ));
    }
    if config.suggestions.snapshot_path == config.ballot.snapshot_path {
        return Err(anyhow!(
            "suggestions and ballot snapshot paths must differ (both are {})",
            config.suggestions.snapshot_path.display()
        ));
    }
    if config.timeout.is_zero() {
        return Err(anyhow!("timeout_secs must be greater than zero"));
    }
    if let Some(base) = &config.api_base {
        if !(base.starts_with("https://") || base.starts_with("http://")) {
            return Err(anyhow!("api_base must be an http(s) URL (got {base:?})"));
        }
    }
    if let TransformConfig::FeatureList(feature_list) = &config.transform {
        if feature_list.title_question_id.trim().is_empty() {
            return Err(anyhow!("feature_list transform needs a title_question_id"));
        }
    }
    let mut seen = BTreeSet::new();
    for candidate in &config.candidates {
        if candidate.question_id.trim().is_empty() || candidate.title.trim().is_empty() {
            return Err(anyhow!(
                "ballot candidate labels need both a question id and a title"
            ));
        }
        if !seen.insert(candidate.question_id.as_str()) {
            return Err(anyhow!(
                "ballot candidate question id {:?} is listed twice",
                candidate.question_id
            ));
        }
    }
    Ok(())
}

/// Form ids are spliced into request paths, so only URL-safe characters pass.
fn validate_form_id(id: &str, label: &str) -> Result<()> {
    if id.is_empty() {
        return Err(anyhow!("{label} must be non-empty"));
    }
    if let Some(bad) = id
        .chars()
        .find(|ch| !(ch.is_ascii_alphanumeric() || *ch == '-' || *ch == '_'))
    {
        return Err(anyhow!("{label} {id:?} contains invalid character {bad:?}"));
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

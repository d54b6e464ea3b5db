//! Cloud credential and region discovery
//!
//! Probes environment variables plus the two section-style key=value files
//! under `~/.aws`, and condenses the result into one status line for the
//! startup banner and the oracle prompt.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Parsed sections of an INI-style file: section -> key -> value
pub type IniSections = HashMap<String, HashMap<String, String>>;

/// Result of probing the local cloud configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudStatus {
    pub has_credentials: bool,
    pub region: Option<String>,
    /// Where credentials/region were found, deduplicated, in probe order
    pub sources: Vec<String>,
}

/// Inputs to the probe, separated from the process environment for testing
#[derive(Debug, Clone, Default)]
pub struct ProbeInputs {
    pub env: BTreeMap<String, String>,
    pub credentials_file: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
}

impl ProbeInputs {
    /// Read the current process environment and `~/.aws/*`
    pub fn from_environment() -> Self {
        let keys = [
            "AWS_ACCESS_KEY_ID",
            "AWS_SECRET_ACCESS_KEY",
            "AWS_REGION",
            "AWS_DEFAULT_REGION",
        ];
        let env = keys
            .iter()
            .filter_map(|k| std::env::var(k).ok().map(|v| (k.to_string(), v)))
            .filter(|(_, v)| !v.is_empty())
            .collect();

        let aws_dir = dirs::home_dir().map(|home| home.join(".aws"));
        Self {
            env,
            credentials_file: aws_dir.as_ref().map(|d| d.join("credentials")),
            config_file: aws_dir.map(|d| d.join("config")),
        }
    }
}

/// Parse a section-style key=value file. Keys before any header land in `default`.
pub fn parse_ini(content: &str) -> IniSections {
    let mut result: IniSections = HashMap::new();
    let mut section = "default".to_string();

    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = if name.is_empty() { "default".to_string() } else { name.to_string() };
            result.entry(section.clone()).or_default();
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        result
            .entry(section.clone())
            .or_default()
            .insert(key.trim().to_string(), value.trim().to_string());
    }

    result
}

fn read_ini(path: Option<&Path>) -> Option<IniSections> {
    let path = path?;
    let content = std::fs::read_to_string(path).ok()?;
    Some(parse_ini(&content))
}

impl CloudStatus {
    /// Probe the given inputs. Unreadable files are skipped silently.
    pub fn probe(inputs: &ProbeInputs) -> Self {
        let mut status = CloudStatus::default();
        let env = |k: &str| inputs.env.get(k).filter(|v| !v.is_empty());

        if env("AWS_ACCESS_KEY_ID").is_some() && env("AWS_SECRET_ACCESS_KEY").is_some() {
            status.has_credentials = true;
            status.push_source("env credentials");
        }
        if let Some(region) = env("AWS_REGION").or_else(|| env("AWS_DEFAULT_REGION")) {
            status.region = Some(region.clone());
            status.push_source("env region");
        }

        if let Some(creds) = read_ini(inputs.credentials_file.as_deref()) {
            let has_keys = creds.get("default").is_some_and(|d| {
                d.get("aws_access_key_id").is_some_and(|v| !v.is_empty())
                    && d.get("aws_secret_access_key").is_some_and(|v| !v.is_empty())
            });
            if has_keys {
                status.has_credentials = true;
                status.push_source("~/.aws/credentials");
            }
        }

        if let Some(config) = read_ini(inputs.config_file.as_deref()) {
            let region = config
                .get("default")
                .or_else(|| config.get("profile default"))
                .and_then(|d| d.get("region"))
                .filter(|r| !r.is_empty());
            if let Some(region) = region {
                if status.region.is_none() {
                    status.region = Some(region.clone());
                }
                status.push_source("~/.aws/config");
            }
        }

        debug!(?status, "Probed cloud configuration");
        status
    }

    fn push_source(&mut self, source: &str) {
        if !self.sources.iter().any(|s| s == source) {
            self.sources.push(source.to_string());
        }
    }

    /// Both credentials and a region were found
    pub fn is_configured(&self) -> bool {
        self.has_credentials && self.region.is_some()
    }

    /// One-line summary shown at startup and embedded in every prompt
    pub fn status_line(&self) -> String {
        if !self.has_credentials && self.region.is_none() {
            return "AWS config not detected (no credentials or region found).".to_string();
        }

        let mut parts = vec![
            if self.has_credentials {
                "credentials: detected".to_string()
            } else {
                "credentials: missing".to_string()
            },
            match &self.region {
                Some(region) => format!("region: {}", region),
                None => "region: missing".to_string(),
            },
        ];
        if !self.sources.is_empty() {
            parts.push(format!("sources: {}", self.sources.join(", ")));
        }
        format!("AWS config status: {}.", parts.join("; "))
    }
}

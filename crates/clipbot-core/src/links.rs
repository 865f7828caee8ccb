//! Recognition of links the clip service can fetch.
//!
//! A static table of site rules decides whether a URL is supported and how
//! to read a start offset from it. Anything that fails to parse is simply
//! unsupported.

// lazy_regex! validates the pattern at compile time and keeps it in a static
#![allow(clippy::non_std_lazy_statics)]

use crate::config::ClipSettings;
use anyhow::{Context, Result};
use lazy_regex::lazy_regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Offset values: plain seconds, optionally suffixed with `s`.
static RE_OFFSET_SECS: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"^(\d+)s?$");

/// A supported link and the second the clip should start at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLink {
    /// Link as written in the message
    pub url: String,
    /// Start offset in seconds
    pub start_offset: u32,
}

impl SourceLink {
    /// Create a source link.
    #[must_use]
    pub fn new(url: impl Into<String>, start_offset: u32) -> Self {
        Self {
            url: url.into(),
            start_offset,
        }
    }
}

/// Which paths of a host are clip sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PathRule {
    /// Anything but the bare root
    NonEmpty,
    /// Path contains the given fragment
    Contains(String),
}

/// Where the start offset comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OffsetRule {
    /// Always start at zero
    #[default]
    None,
    /// Read seconds from a query parameter
    QueryParam(String),
}

/// One supported site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRule {
    /// Host, matched exactly or as a dot-suffix
    pub host: String,
    /// Path requirement
    pub path: PathRule,
    /// Offset extraction
    #[serde(default)]
    pub offset: OffsetRule,
}

impl SiteRule {
    fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let rule_host = self.host.to_ascii_lowercase();
        let host_ok = host == rule_host || host.ends_with(&format!(".{rule_host}"));
        if !host_ok {
            return false;
        }

        match &self.path {
            PathRule::NonEmpty => !url.path().trim_start_matches('/').is_empty(),
            PathRule::Contains(fragment) => url.path().contains(fragment.as_str()),
        }
    }

    fn start_offset(&self, url: &Url) -> u32 {
        let OffsetRule::QueryParam(name) = &self.offset else {
            return 0;
        };
        url.query_pairs()
            .find(|(key, _)| key == name)
            .and_then(|(_, value)| {
                RE_OFFSET_SECS
                    .captures(&value)
                    .and_then(|caps| caps.get(1))
                    .and_then(|m| m.as_str().parse().ok())
            })
            .unwrap_or(0)
    }
}

/// Table of supported sites
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedSites {
    /// Rules, checked in order
    pub sites: Vec<SiteRule>,
}

impl Default for SupportedSites {
    fn default() -> Self {
        Self {
            sites: vec![
                SiteRule {
                    host: "youtu.be".to_string(),
                    path: PathRule::NonEmpty,
                    offset: OffsetRule::QueryParam("t".to_string()),
                },
                SiteRule {
                    host: "youtube.com".to_string(),
                    path: PathRule::Contains("watch".to_string()),
                    offset: OffsetRule::QueryParam("t".to_string()),
                },
                SiteRule {
                    host: "twitch.tv".to_string(),
                    path: PathRule::Contains("/clip/".to_string()),
                    offset: OffsetRule::None,
                },
            ],
        }
    }
}

impl SupportedSites {
    /// Load a table from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading supported sites from {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing supported sites from {}", path.display()))
    }

    /// The configured table, or the built-in one when no path is set.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured file cannot be loaded.
    pub fn from_settings(settings: &ClipSettings) -> Result<Self> {
        match settings.supported_sites_path.as_deref() {
            Some(path) if !path.is_empty() => {
                let sites = Self::load(path)?;
                info!(path, count = sites.sites.len(), "Loaded supported sites");
                Ok(sites)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Classify one token; `None` when unsupported or unparsable.
    #[must_use]
    pub fn recognize(&self, candidate: &str) -> Option<SourceLink> {
        let url = Url::parse(candidate).ok()?;
        let rule = self.sites.iter().find(|rule| rule.matches(&url))?;
        Some(SourceLink::new(candidate, rule.start_offset(&url)))
    }

    /// Supported links of `text`, in order of appearance.
    #[must_use]
    pub fn extract_links(&self, text: &str) -> Vec<SourceLink> {
        let links: Vec<SourceLink> = text
            .split_whitespace()
            .filter_map(|token| self.recognize(token))
            .collect();
        if !links.is_empty() {
            debug!(count = links.len(), "Found supported links");
        }
        links
    }
}

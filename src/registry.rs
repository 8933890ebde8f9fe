//! Learned selectors, partitioned by domain and page.
//!
//! Each domain has one JSON file under the selectors directory. Lookups are
//! served from an in-memory map that is loaded lazily from those files and
//! kept in lockstep with every save. Saves to one domain are serialized.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::errors::{Result, StepwiseError};
use crate::step_text::{self, Verb};

const CONTEXT_LEN: usize = 100;

/// Best-known selector for one element type on a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorEntry {
    pub primary: String,
    #[serde(default)]
    pub alternatives: Vec<String>,
    #[serde(default = "first_verification")]
    pub verified_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success: Option<DateTime<Utc>>,
    /// Step text that first produced this entry, truncated
    #[serde(default)]
    pub context: String,
}

fn first_verification() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageContext {
    #[serde(default)]
    pub url_patterns: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// element type -> entry
    #[serde(default)]
    pub selectors: BTreeMap<String, SelectorEntry>,
}

/// Contents of one domain file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainRegistry {
    pub domain: String,
    #[serde(default)]
    pub pages: BTreeMap<String, PageContext>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl DomainRegistry {
    pub fn new(domain: &str) -> Self {
        let now = Utc::now();
        Self {
            domain: domain.to_string(),
            pages: BTreeMap::new(),
            created_at: now,
            last_updated: now,
        }
    }

    /// Page context for a URL and step: URL pattern, then domain, then keyword, then sole page
    pub fn find_page(&self, url: &str, step: &str) -> Option<&str> {
        if let Some((name, _)) = self
            .pages
            .iter()
            .find(|(_, page)| page.url_patterns.iter().any(|p| matches_pattern(url, p)))
        {
            debug!("Matched page context '{}' by URL pattern", name);
            return Some(name);
        }

        let domain = extract_domain(url);
        if let Some((name, _)) = self.pages.iter().find(|(_, page)| {
            page.url_patterns
                .iter()
                .any(|p| !p.is_empty() && (p.contains(&domain) || domain.contains(p.as_str())))
        }) {
            debug!("Matched page context '{}' by domain", name);
            return Some(name);
        }

        let step_lower = step.to_lowercase();
        if let Some((name, _)) = self.pages.iter().find(|(_, page)| {
            page.keywords
                .iter()
                .any(|k| !k.is_empty() && step_lower.contains(&k.to_lowercase()))
        }) {
            debug!("Matched page context '{}' by keyword", name);
            return Some(name);
        }

        if self.pages.len() == 1 {
            return self.pages.keys().next().map(String::as_str);
        }
        None
    }

    pub fn lookup(&self, url: &str, step: &str, element_type: &str) -> Option<&SelectorEntry> {
        let page = self.find_page(url, step)?;
        self.pages.get(page)?.selectors.get(element_type)
    }

    /// Record a selector that just worked; returns the page context it landed in
    pub fn record(
        &mut self,
        url: &str,
        step: &str,
        element_type: &str,
        selector: &str,
        at: DateTime<Utc>,
    ) -> String {
        let page_name = self
            .find_page(url, step)
            .map(str::to_string)
            .unwrap_or_else(|| page_context_name(url, step));
        let pattern = url_pattern(url);

        let page = self
            .pages
            .entry(page_name.clone())
            .or_insert_with(|| PageContext {
                url_patterns: Vec::new(),
                keywords: step_text::page_keywords(step),
                selectors: BTreeMap::new(),
            });
        if !pattern.is_empty() && !page.url_patterns.contains(&pattern) {
            page.url_patterns.push(pattern);
        }

        match page.selectors.get_mut(element_type) {
            Some(entry) if entry.primary == selector => {
                entry.verified_count += 1;
                entry.last_success = Some(at);
            }
            Some(entry) => {
                let demoted = std::mem::replace(&mut entry.primary, selector.to_string());
                entry.alternatives.retain(|alt| alt != selector);
                if !entry.alternatives.contains(&demoted) {
                    entry.alternatives.push(demoted);
                }
                entry.verified_count = 1;
                entry.last_success = Some(at);
            }
            None => {
                page.selectors.insert(
                    element_type.to_string(),
                    SelectorEntry {
                        primary: selector.to_string(),
                        alternatives: Vec::new(),
                        verified_count: 1,
                        last_success: Some(at),
                        context: step.chars().take(CONTEXT_LEN).collect(),
                    },
                );
            }
        }

        self.last_updated = at;
        page_name
    }
}

/// Host (with port, without `www.`) a URL belongs to
pub fn extract_domain(url: &str) -> String {
    let host = match Url::parse(url.trim()) {
        Ok(parsed) if parsed.host_str().is_some() => host_with_port(&parsed),
        _ => url
            .trim()
            .split("://")
            .last()
            .and_then(|rest| rest.split('/').next())
            .unwrap_or_default()
            .to_string(),
    };
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if host.is_empty() {
        "unknown".to_string()
    } else {
        host.to_string()
    }
}

fn host_with_port(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    }
}

/// Host plus first path segment, e.g. `app.example.com/login`
pub fn url_pattern(url: &str) -> String {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return url.trim().split('/').take(2).collect::<Vec<_>>().join("/");
    };
    let mut pattern = host_with_port(&parsed);
    if let Some(first) = parsed
        .path_segments()
        .and_then(|mut segments| segments.next())
        .filter(|s| !s.is_empty())
    {
        pattern.push('/');
        pattern.push_str(first);
    }
    pattern
}

/// Name for a page context created from a URL and the step that found it
pub fn page_context_name(url: &str, step: &str) -> String {
    let lower = step.to_lowercase();
    if lower.contains("login") {
        return "login_form".to_string();
    }
    if lower.contains("form") {
        return "form".to_string();
    }
    if lower.contains("dashboard") {
        return "dashboard".to_string();
    }

    let Ok(parsed) = Url::parse(url.trim()) else {
        return "page".to_string();
    };
    if let Some(last) = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
    {
        return last.replace(['-', '.'], "_");
    }
    parsed
        .host_str()
        .and_then(|host| host.split('.').next())
        .filter(|label| !label.is_empty())
        .unwrap_or("page")
        .to_string()
}

fn matches_pattern(url: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    url.contains(pattern)
        || RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map(|re| re.is_match(url))
            .unwrap_or(false)
}

/// Filename-safe form of a domain
pub fn safe_domain(domain: &str) -> String {
    domain
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub struct SelectorRegistry {
    dir: PathBuf,
    cache: DashMap<String, DomainRegistry>,
    write_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SelectorRegistry {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            cache: DashMap::new(),
            write_locks: DashMap::new(),
        }
    }

    pub fn file_for(&self, domain: &str) -> PathBuf {
        self.dir.join(format!("{}.json", safe_domain(domain)))
    }

    /// Registry for a domain; missing or corrupt files read as empty
    pub fn domain_registry(&self, domain: &str) -> DomainRegistry {
        if let Some(cached) = self.cache.get(domain) {
            return cached.clone();
        }
        match self.read_file(domain) {
            Ok(Some(registry)) => self.adopt_loaded(domain, registry),
            Ok(None) => DomainRegistry::new(domain),
            Err(e) => {
                warn!("{}", e);
                DomainRegistry::new(domain)
            }
        }
    }

    /// Cache a registry read from disk unless a save got there first
    fn adopt_loaded(&self, domain: &str, loaded: DomainRegistry) -> DomainRegistry {
        self.cache
            .entry(domain.to_string())
            .or_insert(loaded)
            .value()
            .clone()
    }

    fn read_file(&self, domain: &str) -> Result<Option<DomainRegistry>> {
        let path = self.file_for(domain);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StepwiseError::Registry {
                    domain: domain.to_string(),
                    message: format!("cannot read {}: {}", path.display(), e),
                });
            }
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| StepwiseError::Registry {
                domain: domain.to_string(),
                message: format!("corrupt {}: {}", path.display(), e),
            })
    }

    /// Selector remembered for this page and element, if any
    pub fn lookup(&self, url: &str, step: &str, element_type: &str, verb: Verb) -> Option<String> {
        if !verb.targets_element() {
            return None;
        }
        let domain = extract_domain(url);
        let registry = self.domain_registry(&domain);
        let entry = registry.lookup(url, step, element_type)?;
        info!(
            "Found selector from registry: {} -> {} (domain: {})",
            element_type, entry.primary, domain
        );
        Some(entry.primary.clone())
    }

    /// Remember a selector that just verified
    pub async fn save(&self, url: &str, step: &str, element_type: &str, selector: &str) -> Result<()> {
        let domain = extract_domain(url);
        let lock = self
            .write_locks
            .entry(domain.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let mut registry = self.domain_registry(&domain);
        let page = registry.record(url, step, element_type, selector, Utc::now());
        self.write_file(&domain, &registry).await?;
        self.cache.insert(domain.clone(), registry);

        info!(
            "Saved selector to registry: {} -> {} (domain: {}, page: {})",
            element_type, selector, domain, page
        );
        Ok(())
    }

    async fn write_file(&self, domain: &str, registry: &DomainRegistry) -> Result<()> {
        let registry_error = |e: std::io::Error| StepwiseError::Registry {
            domain: domain.to_string(),
            message: e.to_string(),
        };
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(registry_error)?;

        let path = self.file_for(domain);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(registry)?;
        tokio::fs::write(&tmp, body).await.map_err(registry_error)?;
        tokio::fs::rename(&tmp, &path).await.map_err(registry_error)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod registry_test;

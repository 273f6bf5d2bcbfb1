use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::narrative::NarrativeCatalog;

pub const CONFIG_FILE: &str = "kpi.toml";
pub const LOCAL_CONFIG_FILE: &str = "kpi.local.toml";

/// Top-level configuration from `kpi.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub categories: CategoriesConfig,
    #[serde(default)]
    pub tags: TagsConfig,
    /// Architectural layers, matched in declaration order.
    #[serde(default)]
    pub layers: Vec<LayerDefinition>,
    #[serde(default)]
    pub services: HashMap<String, ServiceMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "default_projects_directory")]
    pub projects_directory: PathBuf,
    #[serde(default)]
    pub included_projects: Vec<String>,
    #[serde(default = "default_file_exclusions")]
    pub file_exclusions: Vec<String>,
    #[serde(default = "default_report_output")]
    pub report_output: PathBuf,
}

fn default_projects_directory() -> PathBuf {
    PathBuf::from("./projects")
}

fn default_report_output() -> PathBuf {
    PathBuf::from("reports")
}

fn default_file_exclusions() -> Vec<String> {
    vec![
        "*.lock".to_string(),
        "package-lock.json".to_string(),
        "*.min.js".to_string(),
        "node_modules/*".to_string(),
        "dist/*".to_string(),
    ]
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            projects_directory: default_projects_directory(),
            included_projects: Vec::new(),
            file_exclusions: default_file_exclusions(),
            report_output: default_report_output(),
        }
    }
}

/// Valid service categories, highest priority first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoriesConfig {
    #[serde(default)]
    pub priority: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagsConfig {
    #[serde(default)]
    pub descriptions: HashMap<String, String>,
}

/// A named architectural layer and the tags that place a service in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDefinition {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl LayerDefinition {
    pub fn new(name: impl Into<String>, tags: &[&str]) -> Self {
        Self {
            name: name.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// True if any of `tags` belongs to this layer.
    pub fn matches(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.tags.contains(t))
    }
}

/// Static per-service metadata. The first tag is the primary capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceMetadata {
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl ServiceMetadata {
    pub fn new(category: impl Into<String>, tags: &[&str], description: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            description: description.into(),
        }
    }

    pub fn primary_tag(&self) -> Option<&str> {
        self.tags.first().map(String::as_str)
    }
}

/// Reasons a configuration is rejected at load time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no projects listed in [project].included_projects")]
    NoProjects,
    #[error("missing [services] metadata for: {}", .0.join(", "))]
    MissingMetadata(Vec<String>),
    #[error("service '{service}' uses undefined tag '{tag}'")]
    UndefinedTag { service: String, tag: String },
    #[error("service '{service}' uses undefined category '{category}'")]
    UndefinedCategory { service: String, category: String },
    #[error("layer '{0}' is defined more than once")]
    DuplicateLayer(String),
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config: Config = toml::from_str(&content).with_context(|| {
            format!(
                "failed to parse '{}'. Run `kpi init` to create a valid config file",
                path.display()
            )
        })?;
        config
            .validate()
            .with_context(|| format!("invalid configuration in '{}'", path.display()))?;
        Ok(config)
    }

    /// Pick the config file to load: an explicit path wins, then
    /// `kpi.local.toml` in `dir`, then `kpi.toml` in `dir`.
    pub fn resolve_path(dir: &Path, explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        let local = dir.join(LOCAL_CONFIG_FILE);
        if local.exists() {
            tracing::info!(path = %local.display(), "using local configuration");
            return local;
        }
        dir.join(CONFIG_FILE)
    }

    /// Check cross-references between projects, services, tags, categories and layers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project.included_projects.is_empty() {
            return Err(ConfigError::NoProjects);
        }

        let mut missing: Vec<String> = self
            .project
            .included_projects
            .iter()
            .filter(|p| !self.services.contains_key(*p))
            .cloned()
            .collect();
        if !missing.is_empty() {
            missing.sort();
            missing.dedup();
            return Err(ConfigError::MissingMetadata(missing));
        }

        let mut names: Vec<&String> = self.services.keys().collect();
        names.sort();
        for name in names {
            let meta = &self.services[name];
            if let Some(tag) = meta
                .tags
                .iter()
                .find(|t| !self.tags.descriptions.contains_key(*t))
            {
                return Err(ConfigError::UndefinedTag {
                    service: name.clone(),
                    tag: tag.clone(),
                });
            }
            if !self.categories.priority.contains(&meta.category) {
                return Err(ConfigError::UndefinedCategory {
                    service: name.clone(),
                    category: meta.category.clone(),
                });
            }
        }

        let mut seen = HashSet::new();
        for layer in &self.layers {
            if !seen.insert(layer.name.as_str()) {
                return Err(ConfigError::DuplicateLayer(layer.name.clone()));
            }
        }

        Ok(())
    }

    /// Generate default TOML content for `kpi init`.
    pub fn default_toml() -> String {
        r#"# kpi - Release KPI Report Configuration
#
# Copy to kpi.local.toml to keep organization-specific settings out of
# version control; the local file takes precedence when present.

[project]
# Directory containing one git checkout per service
projects_directory = "./projects"
included_projects = ["api-gateway-service", "user-service", "payment-service"]
# Glob patterns excluded from line counts (matched against path and file name)
file_exclusions = ["*.lock", "package-lock.json", "*.min.js", "node_modules/*", "dist/*"]
report_output = "reports"

[categories]
# Valid categories, highest priority first. Ties in activity resolve to
# the category listed first.
priority = ["Core Infrastructure", "Domain Services", "Supporting Services"]

[tags.descriptions]
API = "API development"
routing = "request routing"
orchestration = "service coordination"
integration = "system integration"
user_management = "user management"
authentication = "authentication"
transaction_processing = "transaction handling"
domain_logic = "business rules"
logging = "logging infrastructure"
monitoring = "monitoring systems"

# Service layers are matched in order; a service joins the first layer
# sharing one of its tags.
[[layers]]
name = "data_layer"
tags = ["ETL", "data_processing", "aggregation", "database", "storage"]

[[layers]]
name = "presentation_layer"
tags = ["data_presentation", "user_interface", "API"]

[[layers]]
name = "business_layer"
tags = ["transaction_processing", "domain_logic", "statistics"]

[[layers]]
name = "infrastructure_layer"
tags = ["orchestration", "integration", "logging", "monitoring"]

[services.api-gateway-service]
category = "Core Infrastructure"
tags = ["API", "routing", "orchestration", "integration"]
description = "API gateway"

[services.user-service]
category = "Core Infrastructure"
tags = ["user_management", "authentication", "API"]
description = "User management"

[services.payment-service]
category = "Domain Services"
tags = ["transaction_processing", "domain_logic", "API"]
description = "Payment processing"
"#
        .to_string()
    }
}

impl NarrativeCatalog for Config {
    fn service_metadata(&self, service: &str) -> Option<&ServiceMetadata> {
        self.services.get(service)
    }

    fn tag_description(&self, tag: &str) -> Option<&str> {
        self.tags.descriptions.get(tag).map(String::as_str)
    }

    fn category_priority(&self) -> &[String] {
        &self.categories.priority
    }

    fn service_layers(&self) -> &[LayerDefinition] {
        &self.layers
    }
}

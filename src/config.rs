//! Configuration loading: category table, run defaults and skip filters.
//!
//! Configuration is TOML. Categories are an array of tables so that their
//! order, which decides which category wins a shared extension, is the order
//! written in the file.
//!
//! ```toml
//! [options]
//! skip_hidden = true
//! recursive = false
//!
//! [[categories]]
//! name = "images"
//! extensions = [".jpg", ".png"]
//!
//! [filters.exclude]
//! filenames = ["Thumbs.db"]
//! patterns = ["*.part"]
//! extensions = ["tmp"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//! ```

use crate::error::ConfigError;
use crate::events::{EventLevel, EventSink};
use crate::file_category::{CategoryTable, normalize_extension};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".dirsort.toml";

/// Complete on-disk configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizerConfig {
    #[serde(default)]
    pub options: RunOptions,

    /// Categories in priority order. Empty means "use the stock table".
    #[serde(default)]
    pub categories: Vec<CategorySpec>,

    #[serde(default)]
    pub filters: FilterRules,
}

/// Defaults for a run; command-line flags override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    #[serde(default = "default_skip_hidden")]
    pub skip_hidden: bool,

    #[serde(default)]
    pub recursive: bool,
}

fn default_skip_hidden() -> bool {
    true
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            skip_hidden: default_skip_hidden(),
            recursive: false,
        }
    }
}

/// One `[[categories]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    #[serde(default)]
    pub extensions: Vec<String>,
}

/// Extra skip rules on top of the hidden-file and reserved-file policies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterRules {
    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Whitelist; a match overrides every exclude rule.
    #[serde(default)]
    pub include: IncludeRules,
}

/// Rules for leaving files where they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact file names (e.g. "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns matched against the path relative to the source directory.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Extensions, with or without the leading dot.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regexes matched against the file name.
    #[serde(default)]
    pub regex: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl OrganizerConfig {
    /// Loads configuration, falling back through the usual locations.
    ///
    /// 1. `config_path`, if given (it must exist)
    /// 2. `.dirsort.toml` in the current directory
    /// 3. `~/.config/dirsort/config.toml`
    /// 4. built-in defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("dirsort")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml_str(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Builds the validated category table.
    ///
    /// Extensions written without a leading dot are accepted and normalized,
    /// with a warning sent to `sink`.
    pub fn category_table(&self, sink: &dyn EventSink) -> Result<CategoryTable, ConfigError> {
        if self.categories.is_empty() {
            return Ok(CategoryTable::default());
        }

        let mut table = CategoryTable::empty();
        for spec in &self.categories {
            for ext in &spec.extensions {
                if !ext.trim().starts_with('.') {
                    sink.emit(
                        EventLevel::Warn,
                        &format!("Extension '{}' in '{}' should start with '.'", ext, spec.name),
                    );
                }
            }
            table.add_category(&spec.name, &spec.extensions)?;
        }
        Ok(table)
    }

    /// Compiles the filter rules.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }

    /// Writes a sample configuration listing the stock categories.
    ///
    /// Refuses to overwrite an existing file.
    pub fn write_sample(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Err(ConfigError::AlreadyExists(path.to_path_buf()));
        }

        let sample = OrganizerConfig {
            options: RunOptions::default(),
            categories: CategoryTable::default()
                .iter()
                .map(|category| CategorySpec {
                    name: category.name().to_string(),
                    extensions: category.extensions().to_vec(),
                })
                .collect(),
            filters: FilterRules {
                exclude: ExcludeRules {
                    filenames: vec!["Thumbs.db".to_string(), "desktop.ini".to_string()],
                    patterns: vec!["*.part".to_string(), "*.crdownload".to_string()],
                    ..ExcludeRules::default()
                },
                include: IncludeRules::default(),
            },
        };

        let body =
            toml::to_string_pretty(&sample).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let content = format!(
            "# dirsort configuration\n# Categories are tried top to bottom; the first match wins.\n\n{}",
            body
        );

        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Filter rules compiled once per run.
#[derive(Debug, Default)]
pub struct CompiledFilters {
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let compile_globs = |patterns: &[String]| {
            patterns
                .iter()
                .map(|pattern| {
                    Pattern::new(pattern)
                        .map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
                })
                .collect::<Result<Vec<_>, _>>()
        };

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| normalize_extension(ext))
                .collect(),
            exclude_patterns: compile_globs(&rules.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&rules.include.patterns)?,
        })
    }

    /// Returns true if the file at `relative_path` (relative to the source
    /// directory) should be left alone.
    pub fn is_excluded(&self, relative_path: &Path) -> bool {
        if self
            .include_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return false;
        }

        let file_name = relative_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return true;
        }

        if let Some(ext) = relative_path.extension()
            && self
                .exclude_extensions
                .contains(&normalize_extension(&ext.to_string_lossy()))
        {
            return true;
        }

        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return true;
        }

        self.exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }
}

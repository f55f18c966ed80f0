//! Configuration and the immutable scan context
//!
//! `Config` is read from an optional `cartograph.toml` at the target root, then
//! environment overrides are applied. A [`ScanContext`] is built from the final
//! config once per run and passed by reference to every stage.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Config file looked up at the target root.
pub const CONFIG_FILE: &str = "cartograph.toml";

/// Default manifest directory, relative to the target root.
pub const DEFAULT_MANIFEST_DIR: &str = ".cartograph";

pub const ENV_MANIFEST_DIR: &str = "CARTOGRAPH_MANIFEST_DIR";
pub const ENV_EXCLUDE: &str = "CARTOGRAPH_EXCLUDE";
pub const ENV_STRICT: &str = "CARTOGRAPH_STRICT";
pub const ENV_STALE_DAYS: &str = "CARTOGRAPH_STALE_DAYS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where manifests are written. Relative paths resolve against the root.
    pub manifest_dir: PathBuf,
    /// Glob patterns matched against root-relative paths.
    pub exclude: Vec<String>,
    /// File extensions (without the dot) treated as source files.
    pub extensions: Vec<String>,
    pub respect_gitignore: bool,
    /// A manifest older than this many days is stale.
    pub stale_after_days: i64,
    /// Treat staleness as a failing exit status.
    pub strict: bool,
    /// Import specifiers with one of these prefixes point into the project.
    pub internal_import_prefixes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            manifest_dir: PathBuf::from(DEFAULT_MANIFEST_DIR),
            exclude: [
                "**/node_modules/**",
                "**/dist/**",
                "**/build/**",
                "**/out/**",
                "**/coverage/**",
                "**/.next/**",
                "**/vendor/**",
                "**/target/**",
                "**/*.min.js",
            ]
            .map(String::from)
            .to_vec(),
            extensions: ["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"]
                .map(String::from)
                .to_vec(),
            respect_gitignore: true,
            stale_after_days: 7,
            strict: false,
            internal_import_prefixes: ["./", "../", "/", "@/", "~/"].map(String::from).to_vec(),
        }
    }
}

impl Config {
    /// Load `cartograph.toml` from `root`, or defaults when there is none.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        if !path.is_file() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config: Config = toml::from_str(&content)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_MANIFEST_DIR).filter(|v| !v.trim().is_empty()) {
            self.manifest_dir = PathBuf::from(dir.trim());
        }
        if let Some(globs) = lookup(ENV_EXCLUDE) {
            self.exclude.extend(
                globs
                    .split(',')
                    .map(str::trim)
                    .filter(|g| !g.is_empty())
                    .map(String::from),
            );
        }
        if let Some(value) = lookup(ENV_STRICT) {
            self.strict = parse_flag(ENV_STRICT, &value)?;
        }
        if let Some(value) = lookup(ENV_STALE_DAYS) {
            self.stale_after_days =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: ENV_STALE_DAYS.to_string(),
                        value: value.clone(),
                    })?;
        }
        Ok(())
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Project-wide parse information taken from `tsconfig.json` / `jsconfig.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    pub config_file: String,
    /// Alias prefixes from `compilerOptions.paths`, e.g. `@app/` for `@app/*`.
    pub path_aliases: Vec<String>,
    pub allow_js: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseMode {
    /// A project config was found and understood.
    Project(ProjectContext),
    /// Every file is parsed on its own.
    FileLocal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    pub mode: ParseMode,
    pub internal_import_prefixes: Vec<String>,
}

impl ParseOptions {
    /// Look for a project config at `root` and fall back to file-local parsing.
    pub fn detect(root: &Path, internal_import_prefixes: Vec<String>) -> Self {
        let mode = ["tsconfig.json", "jsconfig.json"]
            .iter()
            .find_map(|name| read_project_context(root, name))
            .map(ParseMode::Project)
            .unwrap_or(ParseMode::FileLocal);
        ParseOptions {
            mode,
            internal_import_prefixes,
        }
    }

    /// Whether an import specifier points into the project rather than at a package.
    pub fn is_internal_specifier(&self, specifier: &str) -> bool {
        if self
            .internal_import_prefixes
            .iter()
            .any(|prefix| specifier.starts_with(prefix.as_str()))
        {
            return true;
        }
        match &self.mode {
            ParseMode::Project(project) => project
                .path_aliases
                .iter()
                .any(|alias| specifier == alias.trim_end_matches('/') || specifier.starts_with(alias.as_str())),
            ParseMode::FileLocal => false,
        }
    }
}

fn read_project_context(root: &Path, name: &str) -> Option<ProjectContext> {
    let path = root.join(name);
    let raw = std::fs::read_to_string(&path).ok()?;
    let value: serde_json::Value = match serde_json::from_str(&strip_json_comments(&raw)) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("{} is not plain JSON ({}); parsing files locally", name, e);
            return None;
        }
    };
    let options = value.get("compilerOptions");
    let mut path_aliases: Vec<String> = options
        .and_then(|o| o.get("paths"))
        .and_then(|p| p.as_object())
        .map(|paths| {
            paths
                .keys()
                .map(|key| key.trim_end_matches('*').to_string())
                .filter(|alias| !alias.is_empty())
                .collect()
        })
        .unwrap_or_default();
    path_aliases.sort();
    path_aliases.dedup();
    let allow_js = name == "jsconfig.json"
        || options
            .and_then(|o| o.get("allowJs"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

    Some(ProjectContext {
        config_file: name.to_string(),
        path_aliases,
        allow_js,
    })
}

/// Remove `//` and `/* */` comments that sit outside string literals.
fn strip_json_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Everything a scan needs to know, fixed for the duration of one run.
#[derive(Debug, Clone)]
pub struct ScanContext {
    root: PathBuf,
    manifest_dir: PathBuf,
    exclude: GlobSet,
    exclude_patterns: Vec<String>,
    extensions: BTreeSet<String>,
    respect_gitignore: bool,
    stale_after_days: i64,
    strict: bool,
    parse: ParseOptions,
}

impl ScanContext {
    pub fn new(root: &Path, config: &Config) -> Result<Self, ConfigError> {
        if !root.is_dir() {
            return Err(ConfigError::RootNotFound(root.to_path_buf()));
        }
        let root = root.canonicalize()?;

        let mut builder = GlobSetBuilder::new();
        for pattern in &config.exclude {
            builder.add(Glob::new(pattern)?);
        }
        let exclude = builder.build()?;

        let manifest_dir = if config.manifest_dir.is_absolute() {
            config.manifest_dir.clone()
        } else {
            root.join(&config.manifest_dir)
        };

        let parse = ParseOptions::detect(&root, config.internal_import_prefixes.clone());
        match &parse.mode {
            ParseMode::Project(project) => tracing::debug!(
                "Using project parse context from {} ({} path aliases)",
                project.config_file,
                project.path_aliases.len()
            ),
            ParseMode::FileLocal => tracing::debug!("No project config found; parsing files locally"),
        }

        Ok(ScanContext {
            root,
            manifest_dir,
            exclude,
            exclude_patterns: config.exclude.clone(),
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            respect_gitignore: config.respect_gitignore,
            stale_after_days: config.stale_after_days,
            strict: config.strict,
            parse,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_dir(&self) -> &Path {
        &self.manifest_dir
    }

    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }

    pub fn respect_gitignore(&self) -> bool {
        self.respect_gitignore
    }

    pub fn stale_after_days(&self) -> i64 {
        self.stale_after_days
    }

    pub fn strict(&self) -> bool {
        self.strict
    }

    pub fn parse_options(&self) -> &ParseOptions {
        &self.parse
    }

    /// Whether a root-relative path is excluded. Directories also match patterns
    /// written for their contents, such as `**/node_modules/**`.
    pub fn is_excluded(&self, relative: &str, is_dir: bool) -> bool {
        if relative.is_empty() {
            return false;
        }
        self.exclude.is_match(relative)
            || (is_dir && self.exclude.is_match(format!("{}/_", relative)))
    }

    /// Whether a root-relative path has one of the configured source extensions.
    pub fn is_source_file(&self, relative: &str) -> bool {
        Path::new(relative)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext.to_ascii_lowercase()))
    }
}

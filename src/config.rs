// src/config.rs
// Two-layer configuration: `FileConfig` is the serde-facing user file
// (TOML or JSON), `Config` is the validated, immutable runtime shape the
// pipeline consumes. All validation happens at resolve time, before any
// network I/O.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use crate::message::RenderMessage;
use crate::sources::app_store;

const ENV_CONFIG_PATH: &str = "REVIEW_CONFIG_PATH";
const DEFAULT_TOML_PATH: &str = "config/apps.toml";
const DEFAULT_JSON_PATH: &str = "config/apps.json";

/// Pages fetched per region when an app does not set `page_range`.
pub const DEFAULT_PAGE_RANGE: u32 = 5;

/// Raw config file contents.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub apps: Vec<FileApp>,
    /// Cap on stored ids per app. Unset means unbounded.
    #[serde(default)]
    pub review_limit: Option<usize>,
    #[serde(default)]
    pub verbose: Option<bool>,
}

/// One application entry as written by the user.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileApp {
    pub id: String,
    #[serde(default)]
    pub store: Option<StoreKind>,
    #[serde(default)]
    pub regions: Option<RegionSpec>,
    #[serde(default)]
    pub page_range: Option<u32>,
    #[serde(default)]
    pub publisher_key: Option<PathBuf>,
    #[serde(default)]
    pub show_app_icon: Option<bool>,
    #[serde(default)]
    pub app_icon: Option<String>,
    #[serde(default)]
    pub verbose: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreKind {
    AppStore,
    PlayStore,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::AppStore => "app-store",
            StoreKind::PlayStore => "play-store",
        }
    }
}

/// `regions = "all"` or `regions = ["de", "us", ...]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RegionSpec {
    Keyword(String),
    List(Vec<String>),
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_from(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading app config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing app config {}", path.display()))
}

/// Load config using env var + fallbacks:
/// 1) $REVIEW_CONFIG_PATH
/// 2) config/apps.toml
/// 3) config/apps.json
pub fn load_default() -> Result<FileConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_from(&pb);
        }
        return Err(anyhow!("REVIEW_CONFIG_PATH points to non-existent path"));
    }
    let toml_p = PathBuf::from(DEFAULT_TOML_PATH);
    if toml_p.exists() {
        return load_from(&toml_p);
    }
    let json_p = PathBuf::from(DEFAULT_JSON_PATH);
    if json_p.exists() {
        return load_from(&json_p);
    }
    bail!("no app config found; set {ENV_CONFIG_PATH} or create {DEFAULT_TOML_PATH}")
}

fn parse_config(s: &str, hint_ext: &str) -> Result<FileConfig> {
    // Try TOML first if hinted or content looks like toml.
    let try_toml = hint_ext == "toml" || s.contains("[[apps]]");
    if try_toml {
        if let Ok(v) = toml::from_str(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = serde_json::from_str(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = toml::from_str(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported app config format"))
}

/// Validated runtime configuration. Never written back to after resolve.
#[derive(Debug, Clone)]
pub struct Config {
    pub apps: Vec<ResolvedApp>,
    pub review_limit: Option<usize>,
}

/// Source-specific fetch parameters, fixed by the app's store kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceParams {
    AppStore { regions: Vec<String>, page_range: u32 },
    PlayStore { publisher_key: PathBuf },
}

/// One application after validation, with all defaults applied.
#[derive(Clone)]
pub struct ResolvedApp {
    pub id: String,
    pub params: SourceParams,
    /// Use the icon fetched from the store as the message thumb.
    pub show_app_icon: bool,
    /// Fallback thumb URL when `show_app_icon` is off.
    pub icon_override: Option<String>,
    pub verbose: bool,
    /// Message renderer override; `None` uses the store default.
    pub renderer: Option<Arc<dyn RenderMessage>>,
}

impl fmt::Debug for ResolvedApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedApp")
            .field("id", &self.id)
            .field("params", &self.params)
            .field("show_app_icon", &self.show_app_icon)
            .field("icon_override", &self.icon_override)
            .field("verbose", &self.verbose)
            .field("renderer", &self.renderer.is_some())
            .finish()
    }
}

impl ResolvedApp {
    pub fn kind(&self) -> StoreKind {
        match self.params {
            SourceParams::AppStore { .. } => StoreKind::AppStore,
            SourceParams::PlayStore { .. } => StoreKind::PlayStore,
        }
    }

    /// Swap in a custom message renderer for this app.
    pub fn with_renderer(mut self, renderer: Arc<dyn RenderMessage>) -> Self {
        self.renderer = Some(renderer);
        self
    }
}

impl Config {
    /// Consume a parsed config file into the immutable runtime shape.
    /// Every validation error surfaces here, before any fetch starts.
    pub fn resolve(file: FileConfig) -> Result<Self> {
        let global_verbose = file.verbose.unwrap_or(false);
        let mut apps = Vec::with_capacity(file.apps.len());
        for app in file.apps {
            apps.push(resolve_app(app, global_verbose)?);
        }
        Ok(Self {
            apps,
            review_limit: file.review_limit,
        })
    }
}

fn resolve_app(app: FileApp, global_verbose: bool) -> Result<ResolvedApp> {
    let kind = match app.store {
        Some(kind) => kind,
        None => {
            // Migration aid for configs written before `store` existed.
            let guessed = if app.id.contains('.') {
                StoreKind::PlayStore
            } else {
                StoreKind::AppStore
            };
            tracing::warn!(
                app = %app.id,
                guessed = guessed.as_str(),
                "app config omits `store`; classified by id shape - set `store` explicitly"
            );
            guessed
        }
    };

    let params = match kind {
        StoreKind::AppStore => {
            if app.publisher_key.is_some() {
                bail!(
                    "app {}: `publisher_key` is not valid for an app-store app",
                    app.id
                );
            }
            let regions = expand_regions(&app.id, app.regions)?;
            let page_range = app.page_range.unwrap_or(DEFAULT_PAGE_RANGE);
            if page_range == 0 {
                bail!("app {}: `page_range` must be at least 1", app.id);
            }
            SourceParams::AppStore { regions, page_range }
        }
        StoreKind::PlayStore => {
            if app.regions.is_some() {
                bail!("app {}: `regions` is not valid for a play-store app", app.id);
            }
            if app.page_range.is_some() {
                bail!(
                    "app {}: `page_range` is not valid for a play-store app",
                    app.id
                );
            }
            let publisher_key = app.publisher_key.ok_or_else(|| {
                anyhow!("app {}: a play-store app requires `publisher_key`", app.id)
            })?;
            SourceParams::PlayStore { publisher_key }
        }
    };

    Ok(ResolvedApp {
        id: app.id,
        params,
        show_app_icon: app.show_app_icon.unwrap_or(false),
        icon_override: app.app_icon,
        verbose: app.verbose.unwrap_or(global_verbose),
        renderer: None,
    })
}

fn expand_regions(app_id: &str, spec: Option<RegionSpec>) -> Result<Vec<String>> {
    let regions = match spec {
        Some(RegionSpec::Keyword(word)) if word == "all" => app_store::all_regions().to_vec(),
        Some(RegionSpec::Keyword(word)) => {
            bail!("app {app_id}: unknown `regions` keyword {word:?}; use \"all\" or a list")
        }
        Some(RegionSpec::List(list)) => list,
        None => Vec::new(),
    };
    if regions.is_empty() {
        bail!("app {app_id}: at least one region must be configured");
    }
    Ok(regions)
}

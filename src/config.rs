// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Window, clear color, shader paths and logging. Every section falls back to
// its defaults, so an empty or missing file is a valid configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::renderer::{RendererSettings, DEFAULT_CLEAR_COLOR};

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub debug: DebugConfig,
}

/// Window settings. The window is never resizable.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Test window".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// Graphics settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub clear_color: [f32; 4],
    /// Compiled SPIR-V, relative to the working directory
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            clear_color: DEFAULT_CLEAR_COLOR,
            vertex_shader: PathBuf::from("shaders/triangle.vert.spv"),
            fragment_shader: PathBuf::from("shaders/triangle.frag.spv"),
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Used when RUST_LOG is not set
    pub log_level: String,
    pub log_to_file: bool,
    pub log_file: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_to_file: false,
            log_file: "trianglevk.log".to_string(),
        }
    }
}

impl DebugConfig {
    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or_else(|_| {
            eprintln!("Unknown log level '{}', using info", self.log_level);
            log::LevelFilter::Info
        })
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// The part of the configuration the renderer itself consumes.
    pub fn renderer_settings(&self) -> RendererSettings {
        RendererSettings {
            clear_color: self.graphics.clear_color,
        }
    }
}

//! Application settings loaded from config file

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::font::{find_system_font, BakeSettings};
use crate::ticker::DEFAULT_HISTORY_LEN;
use crate::ui::plot::PlotTransform;
use crate::ui::renderer::{CanvasSize, Palette, TickerStyle};
use crate::ui::vertex::DEFAULT_VERTEX_CAPACITY;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Price feed settings
    #[serde(default)]
    pub ticker: TickerConfig,
    /// Font settings
    #[serde(default)]
    pub font: FontConfig,
    /// Widget size
    #[serde(default)]
    pub canvas: CanvasConfig,
    /// Widget colors
    #[serde(default)]
    pub colors: ColorConfig,
}

/// Price feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerConfig {
    /// Base asset, e.g. BTC
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Quote asset, e.g. USDT
    #[serde(default = "default_quote")]
    pub quote: String,
    /// Milliseconds between price samples
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Samples kept for the sparkline
    #[serde(default = "default_history_len")]
    pub history_len: usize,
    #[serde(default = "default_start_price")]
    pub start_price: f64,
    /// Largest relative change per sample
    #[serde(default = "default_volatility")]
    pub volatility: f64,
}

fn default_symbol() -> String {
    "BTC".to_string()
}

fn default_quote() -> String {
    "USDT".to_string()
}

fn default_interval_ms() -> u64 {
    300
}

fn default_history_len() -> usize {
    DEFAULT_HISTORY_LEN
}

fn default_start_price() -> f64 {
    64_000.0
}

fn default_volatility() -> f64 {
    0.002
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            quote: default_quote(),
            interval_ms: default_interval_ms(),
            history_len: default_history_len(),
            start_price: default_start_price(),
            volatility: default_volatility(),
        }
    }
}

impl TickerConfig {
    /// Caption shown under the price, e.g. `BTC/USDT`
    pub fn pair(&self) -> String {
        format!("{}/{}", self.symbol, self.quote)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

/// Font configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontConfig {
    /// Font file to bake, or a `.json` atlas record
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Price label size in CSS pixels
    #[serde(default = "default_top_size")]
    pub top_size: f32,
    /// Caption size in CSS pixels
    #[serde(default = "default_bottom_size")]
    pub bottom_size: f32,
    /// Extra pixels between lines
    #[serde(default)]
    pub line_gap: f32,
    /// Rasterization size when baking
    #[serde(default = "default_bake_size")]
    pub bake_size: f32,
    /// Distance field border in texels
    #[serde(default = "default_sdf_border")]
    pub sdf_border: u32,
}

fn default_top_size() -> f32 {
    32.0
}

fn default_bottom_size() -> f32 {
    14.0
}

fn default_bake_size() -> f32 {
    48.0
}

fn default_sdf_border() -> u32 {
    4
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            path: None,
            top_size: default_top_size(),
            bottom_size: default_bottom_size(),
            line_gap: 0.0,
            bake_size: default_bake_size(),
            sdf_border: default_sdf_border(),
        }
    }
}

impl FontConfig {
    /// Configured font, or an installed system font when none is set
    pub fn font_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(|| {
            let found = find_system_font();
            match &found {
                Some(path) => tracing::warn!("No font configured, falling back to {:?}", path),
                None => tracing::warn!("No font configured and no system font found"),
            }
            found
        })
    }

    pub fn bake_settings(&self) -> BakeSettings {
        BakeSettings {
            raster_size: self.bake_size,
            sdf_border: self.sdf_border,
            ..BakeSettings::default()
        }
    }
}

/// Widget size in CSS pixels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasConfig {
    #[serde(default = "default_canvas_width")]
    pub width: f32,
    #[serde(default = "default_canvas_height")]
    pub height: f32,
}

fn default_canvas_width() -> f32 {
    200.0
}

fn default_canvas_height() -> f32 {
    67.0
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: default_canvas_width(),
            height: default_canvas_height(),
        }
    }
}

impl CanvasConfig {
    pub fn canvas_size(&self, pixel_ratio: f32) -> CanvasSize {
        CanvasSize {
            width: self.width,
            height: self.height,
            pixel_ratio,
        }
    }
}

/// RGBA colors, components in 0..=1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorConfig {
    #[serde(default = "default_up")]
    pub up: [f32; 4],
    #[serde(default = "default_down")]
    pub down: [f32; 4],
    #[serde(default = "default_text")]
    pub text: [f32; 4],
}

fn default_up() -> [f32; 4] {
    Palette::default().up
}

fn default_down() -> [f32; 4] {
    Palette::default().down
}

fn default_text() -> [f32; 4] {
    Palette::default().text
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            up: default_up(),
            down: default_down(),
            text: default_text(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// Looks for config at:
    /// 1. ~/.config/coin-ticker/config.toml
    /// 2. Creates default config if not found
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            let config = Self::default();
            config.save_to_path(&config_path)?;
            tracing::info!("Created default config at {:?}", config_path);
            Ok(config)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, &contents)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default config file path
    ///
    /// Priority:
    /// 1. $XDG_CONFIG_HOME/coin-ticker/config.toml
    /// 2. ~/.config/coin-ticker/config.toml
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            Ok(PathBuf::from(xdg_config).join("coin-ticker").join("config.toml"))
        } else {
            let home = dirs::home_dir().context("Could not determine home directory")?;
            Ok(home.join(".config").join("coin-ticker").join("config.toml"))
        }
    }

    /// Compositor style built from the font and color sections
    pub fn style(&self) -> TickerStyle {
        TickerStyle {
            top_size: self.font.top_size,
            bottom_size: self.font.bottom_size,
            line_gap: self.font.line_gap,
            palette: Palette {
                up: self.colors.up,
                down: self.colors.down,
                text: self.colors.text,
            },
            vertex_capacity: DEFAULT_VERTEX_CAPACITY,
            plot: PlotTransform::default(),
        }
    }
}

//! Configuration loading

pub mod settings;

pub use settings::{CanvasConfig, ColorConfig, Config, FontConfig, TickerConfig};

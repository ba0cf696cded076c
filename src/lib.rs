//! Coin Ticker - a live price widget drawn with SDF text and a sparkline
//!
//! The compositor in [`ui::renderer`] is backend agnostic; the binary drives
//! it with [`ui::wgpu_backend::WgpuBackend`] and tests use
//! [`ui::backend::RecordingBackend`].

pub mod coins;
pub mod config;
pub mod font;
pub mod search;
pub mod ticker;
pub mod ui;

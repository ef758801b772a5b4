//! Shared value types for the jellyfield workspace.
//!
//! # Invariants
//! - A validated [`LevelData`] never places two spawns on one cell of a wave.
//! - Every tuning constant lives in [`GameConfig`]; nothing downstream hardcodes them.

pub mod config;
pub mod level;
pub mod types;

pub use config::{ConfigError, GameConfig};
pub use level::{LevelData, LevelError, SpawnDescriptor, WaveData};
pub use types::{BlockColor, Palette, Tier};

pub fn crate_info() -> &'static str {
    "jellyfield-common v0.1.0"
}

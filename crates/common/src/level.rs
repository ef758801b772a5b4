//! Level descriptions: grid dimensions, ordered waves of spawn descriptors,
//! hammer charges and an optional tuning override.
//!
//! Levels are authored as YAML (`.yaml`/`.yml`) or JSON (`.json`).

use crate::config::{ConfigError, GameConfig};
use crate::types::{BlockColor, Tier};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Errors from level loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported level format: {0:?}")]
    UnsupportedFormat(String),
    #[error("invalid level: {reason}")]
    Invalid { reason: String },
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
}

fn invalid(reason: impl Into<String>) -> LevelError {
    LevelError::Invalid {
        reason: reason.into(),
    }
}

/// One block to place when a wave starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnDescriptor {
    pub x: i32,
    pub y: i32,
    pub color: BlockColor,
    pub tier: Tier,
}

impl SpawnDescriptor {
    pub fn new(x: i32, y: i32, color: BlockColor, tier: Tier) -> Self {
        Self { x, y, color, tier }
    }
}

/// A batch of spawns processed as a unit, plus how fast the grid advances
/// toward the player while it is alive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveData {
    #[serde(default)]
    pub advance_speed: f32,
    #[serde(default)]
    pub enemies: Vec<SpawnDescriptor>,
}

fn default_origin() -> Vec3 {
    Vec3::new(0.0, 2.0, 15.0)
}

fn default_name() -> String {
    "untitled".into()
}

/// A complete level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelData {
    #[serde(default = "default_name")]
    pub name: String,
    pub columns: u32,
    pub rows: u32,
    #[serde(default = "default_origin")]
    pub grid_origin: Vec3,
    #[serde(default)]
    pub hammer_charges: u32,
    #[serde(default)]
    pub config: GameConfig,
    pub waves: Vec<WaveData>,
}

impl LevelData {
    /// Load and validate a level, picking the parser from the file extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LevelError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        let text = std::fs::read_to_string(path)?;
        let level: Self = match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&text)?,
            "json" => serde_json::from_str(&text)?,
            _ => return Err(LevelError::UnsupportedFormat(ext)),
        };
        level.validate()?;
        tracing::info!(
            name = %level.name,
            waves = level.waves.len(),
            columns = level.columns,
            rows = level.rows,
            "level loaded"
        );
        Ok(level)
    }

    /// Write the level as pretty JSON or YAML depending on the extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), LevelError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        let text = match ext.as_str() {
            "yaml" | "yml" => serde_yaml::to_string(self)?,
            "json" => serde_json::to_string_pretty(self)?,
            _ => return Err(LevelError::UnsupportedFormat(ext)),
        };
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Structural checks that the simulation relies on.
    pub fn validate(&self) -> Result<(), LevelError> {
        if self.columns == 0 || self.rows == 0 {
            return Err(invalid(format!(
                "grid must be at least 1x1, got {}x{}",
                self.columns, self.rows
            )));
        }
        if self.waves.is_empty() {
            return Err(invalid("level has no waves"));
        }
        for (w, wave) in self.waves.iter().enumerate() {
            let mut seen = HashSet::new();
            for spawn in &wave.enemies {
                if spawn.x < 0 || spawn.x >= self.columns as i32 {
                    return Err(invalid(format!(
                        "wave {w}: column {} outside 0..{}",
                        spawn.x, self.columns
                    )));
                }
                if spawn.y < 0 {
                    return Err(invalid(format!("wave {w}: negative row {}", spawn.y)));
                }
                if !seen.insert((spawn.x, spawn.y)) {
                    return Err(invalid(format!(
                        "wave {w}: two spawns at ({}, {})",
                        spawn.x, spawn.y
                    )));
                }
            }
        }
        self.config.validate()?;
        Ok(())
    }

    /// Largest number of spawns in any single wave.
    pub fn max_wave_size(&self) -> usize {
        self.waves.iter().map(|w| w.enemies.len()).max().unwrap_or(0)
    }

    /// Capacity the enemy stream needs to hold any wave of this level.
    pub fn enemy_capacity(&self) -> usize {
        self.max_wave_size().max(self.config.min_enemy_capacity)
    }

    /// Sum of starting hit points over every wave.
    pub fn total_enemy_hp(&self) -> u64 {
        self.waves
            .iter()
            .flat_map(|w| w.enemies.iter())
            .map(|s| u64::from(s.tier.max_hp()))
            .sum()
    }

    /// Built-in three-wave level used when no file is given.
    pub fn demo() -> Self {
        use BlockColor::*;
        let mut waves = Vec::new();

        let mut first = Vec::new();
        for x in 0..6 {
            for y in 0..3 {
                let color = BlockColor::ALL[((x + y) % 4) as usize];
                first.push(SpawnDescriptor::new(x, y, color, Tier::Tiny));
            }
        }
        waves.push(WaveData {
            advance_speed: 0.1,
            enemies: first,
        });

        let mut second = Vec::new();
        for x in 0..6 {
            for y in 0..4 {
                let (color, tier) = match (x + 2 * y) % 5 {
                    0 => (Red, Tier::Standard),
                    1 => (Blue, Tier::Tiny),
                    2 => (Green, Tier::Standard),
                    3 => (Yellow, Tier::Tiny),
                    _ => (Blue, Tier::Standard),
                };
                second.push(SpawnDescriptor::new(x, y, color, tier));
            }
        }
        waves.push(WaveData {
            advance_speed: 0.15,
            enemies: second,
        });

        let mut third = Vec::new();
        for x in 0..6 {
            third.push(SpawnDescriptor::new(x, 0, BlockColor::ALL[x as usize % 4], Tier::Tank));
            third.push(SpawnDescriptor::new(x, 1, BlockColor::ALL[(x as usize + 1) % 4], Tier::Medium));
            third.push(SpawnDescriptor::new(x, 2, Yellow, Tier::Standard));
        }
        waves.push(WaveData {
            advance_speed: 0.2,
            enemies: third,
        });

        Self {
            name: "demo".into(),
            columns: 6,
            rows: 8,
            grid_origin: default_origin(),
            hammer_charges: 3,
            config: GameConfig::default(),
            waves,
        }
    }
}

use crate::types::Palette;
use serde::{Deserialize, Serialize};

/// Errors from tuning-value validation.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f32 },
    #[error("deform_decay_rate must be in (0, 1], got {0}")]
    DecayOutOfRange(f32),
    #[error("projectile_pool_size must be at least 1")]
    EmptyProjectilePool,
}

/// Tuning constants shared by the simulation and the render pipeline.
///
/// Every field has a default, so a partial `config:` section in a level file
/// only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// World-space edge length of one grid cell.
    pub cell_size: f32,
    /// Per-60Hz-frame multiplier applied to `deform_impact`.
    pub deform_decay_rate: f32,
    /// Seconds from lethal damage to removal.
    pub death_shrink_duration: f32,
    /// Divisor on the death spin: a full death spins `360 / death_spin_speed` degrees.
    pub death_spin_speed: f32,
    /// Fall acceleration used when a block moves toward its target slot.
    pub gravity: f32,
    /// Squared distance under which a falling block snaps onto its target.
    pub snap_threshold_sq: f32,
    pub projectile_speed: f32,
    pub projectile_scale: f32,
    /// Seconds a projectile lives before its slot is freed.
    pub projectile_lifetime: f32,
    pub projectile_pool_size: usize,
    /// Instances farther than this from the camera are culled.
    pub cull_distance: f32,
    /// Added to a mesh's bounding radius before the frustum test.
    pub bounds_padding: f32,
    /// Lower bound on the enemy batch capacity regardless of wave sizes.
    pub min_enemy_capacity: usize,
    pub palette: Palette,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            cell_size: 1.2,
            deform_decay_rate: 0.85,
            death_shrink_duration: 0.35,
            death_spin_speed: 0.2,
            gravity: 20.0,
            snap_threshold_sq: 0.002,
            projectile_speed: 25.0,
            projectile_scale: 0.3,
            projectile_lifetime: 3.0,
            projectile_pool_size: 256,
            cull_distance: 200.0,
            bounds_padding: 1.5,
            min_enemy_capacity: 64,
            palette: Palette::default(),
        }
    }
}

impl GameConfig {
    /// Squared cull distance, as consumed by the culling kernel.
    pub fn max_distance_sq(&self) -> f32 {
        self.cull_distance * self.cull_distance
    }

    /// Check every value the simulation divides by or scales with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positives = [
            ("cell_size", self.cell_size),
            ("death_shrink_duration", self.death_shrink_duration),
            ("death_spin_speed", self.death_spin_speed),
            ("gravity", self.gravity),
            ("snap_threshold_sq", self.snap_threshold_sq),
            ("projectile_speed", self.projectile_speed),
            ("projectile_scale", self.projectile_scale),
            ("projectile_lifetime", self.projectile_lifetime),
            ("cull_distance", self.cull_distance),
        ];
        for (field, value) in positives {
            if !(value > 0.0) {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        if !(self.deform_decay_rate > 0.0 && self.deform_decay_rate <= 1.0) {
            return Err(ConfigError::DecayOutOfRange(self.deform_decay_rate));
        }
        if self.projectile_pool_size == 0 {
            return Err(ConfigError::EmptyProjectilePool);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(GameConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_zero_death_duration() {
        let cfg = GameConfig {
            death_shrink_duration: 0.0,
            ..GameConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::NotPositive {
                field: "death_shrink_duration",
                ..
            })
        ));
    }

    #[test]
    fn rejects_decay_above_one() {
        let cfg = GameConfig {
            deform_decay_rate: 1.5,
            ..GameConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::DecayOutOfRange(1.5)));
    }

    #[test]
    fn partial_override_keeps_defaults() {
        let cfg: GameConfig = serde_yaml::from_str("cell_size: 2.0\n").unwrap();
        assert_eq!(cfg.cell_size, 2.0);
        assert_eq!(cfg.gravity, 20.0);
        assert_eq!(cfg.projectile_pool_size, 256);
    }

    #[test]
    fn squared_cull_distance() {
        let cfg = GameConfig::default();
        assert_eq!(cfg.max_distance_sq(), 40_000.0);
    }
}

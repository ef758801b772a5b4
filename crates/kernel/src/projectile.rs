use glam::{Quat, Vec3};
use jellyfield_common::{BlockColor, GameConfig, Palette};
use jellyfield_render::{InstanceBatch, InstanceRecord};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projectile {
    pub position: Vec3,
    pub velocity: Vec3,
    pub color: BlockColor,
    pub remaining_lifetime: f32,
    pub active: bool,
}

impl Default for Projectile {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            color: BlockColor::Red,
            remaining_lifetime: 0.0,
            active: false,
        }
    }
}

/// Fixed pool of cosmetic projectiles. A freed slot is reused by the next
/// spawn; spawning into a full pool drops the projectile.
#[derive(Debug, Clone)]
pub struct ProjectilePool {
    slots: Box<[Projectile]>,
    live: usize,
    speed: f32,
    lifetime: f32,
    scale: f32,
    palette: Palette,
}

impl ProjectilePool {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            slots: vec![Projectile::default(); config.projectile_pool_size].into_boxed_slice(),
            live: 0,
            speed: config.projectile_speed,
            lifetime: config.projectile_lifetime,
            scale: config.projectile_scale,
            palette: config.palette,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn projectiles(&self) -> impl Iterator<Item = &Projectile> {
        self.slots.iter().filter(|p| p.active)
    }

    /// Launch a projectile from `origin` toward `target`. Returns false when
    /// the pool is full.
    pub fn spawn(&mut self, origin: Vec3, target: Vec3, color: BlockColor) -> bool {
        let Some(slot) = self.slots.iter_mut().find(|p| !p.active) else {
            tracing::trace!("projectile pool full, spawn dropped");
            return false;
        };
        *slot = Projectile {
            position: origin,
            velocity: (target - origin).normalize_or_zero() * self.speed,
            color,
            remaining_lifetime: self.lifetime,
            active: true,
        };
        self.live += 1;
        true
    }

    /// Free every slot.
    pub fn clear(&mut self) {
        for p in self.slots.iter_mut() {
            p.active = false;
        }
        self.live = 0;
    }

    /// Move live projectiles, expire old ones and write the survivors densely
    /// into `batch`.
    pub fn tick(&mut self, dt: f32, batch: &mut InstanceBatch) {
        let _span = tracing::info_span!("projectile_tick").entered();
        batch.clear();
        for p in self.slots.iter_mut().filter(|p| p.active) {
            p.position += p.velocity * dt;
            p.remaining_lifetime -= dt;
            if p.remaining_lifetime <= 0.0 {
                p.active = false;
                self.live -= 1;
                continue;
            }

            let mut record = InstanceRecord {
                base_color: self.palette.color(p.color),
                ..InstanceRecord::default()
            };
            record.set_transform(p.position, Quat::IDENTITY, self.scale);
            batch.push(record);
        }
        batch.mark_dirty();
        tracing::trace!(live = self.live, "projectile batch projected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jellyfield_render::StreamKind;

    fn pool(size: usize) -> ProjectilePool {
        ProjectilePool::new(&GameConfig {
            projectile_pool_size: size,
            ..GameConfig::default()
        })
    }

    #[test]
    fn spawn_sets_velocity_toward_target() {
        let mut p = pool(4);
        assert!(p.spawn(Vec3::ZERO, Vec3::new(0.0, 0.0, 10.0), BlockColor::Green));
        let proj = p.projectiles().next().unwrap();
        assert!((proj.velocity - Vec3::new(0.0, 0.0, 25.0)).length() < 1e-4);
        assert_eq!(proj.remaining_lifetime, 3.0);
        assert_eq!(p.live_count(), 1);
    }

    #[test]
    fn full_pool_drops_spawn() {
        let mut p = pool(2);
        assert!(p.spawn(Vec3::ZERO, Vec3::X, BlockColor::Red));
        assert!(p.spawn(Vec3::ZERO, Vec3::X, BlockColor::Red));
        assert!(!p.spawn(Vec3::ZERO, Vec3::X, BlockColor::Red));
        assert_eq!(p.live_count(), 2);
    }

    #[test]
    fn expired_slots_are_reused_and_batch_is_compacted() {
        let mut p = pool(3);
        let mut batch = InstanceBatch::new(StreamKind::Projectile, p.capacity());
        p.spawn(Vec3::ZERO, Vec3::Z, BlockColor::Red);
        p.tick(2.0, &mut batch);
        p.spawn(Vec3::ZERO, Vec3::X, BlockColor::Blue);
        p.spawn(Vec3::ZERO, Vec3::Y, BlockColor::Yellow);
        assert_eq!(batch.active_count(), 1);

        p.tick(1.5, &mut batch);
        assert_eq!(p.live_count(), 2);
        assert_eq!(batch.active_count(), 2);
        assert_eq!(batch.active()[0].base_color, GameConfig::default().palette.blue);

        assert!(p.spawn(Vec3::ZERO, Vec3::Z, BlockColor::Green));
        assert_eq!(p.live_count(), 3);
    }

    #[test]
    fn degenerate_direction_does_not_produce_nan() {
        let mut p = pool(1);
        p.spawn(Vec3::ONE, Vec3::ONE, BlockColor::Red);
        let mut batch = InstanceBatch::new(StreamKind::Projectile, 1);
        p.tick(0.1, &mut batch);
        assert!(batch.active()[0].position().is_finite());
    }

    #[test]
    fn active_count_matches_live_projectiles() {
        let mut p = pool(8);
        let mut batch = InstanceBatch::new(StreamKind::Projectile, 8);
        for i in 0..5 {
            p.spawn(Vec3::ZERO, Vec3::new(i as f32, 0.0, 1.0), BlockColor::Red);
            p.tick(0.7, &mut batch);
            assert_eq!(batch.active_count(), p.live_count());
        }
        p.clear();
        p.tick(0.1, &mut batch);
        assert_eq!(batch.active_count(), 0);
    }
}

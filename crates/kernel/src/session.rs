use crate::events::GridEvent;
use crate::grid::EntityStore;
use crate::projectile::ProjectilePool;
use glam::Vec3;
use jellyfield_common::{BlockColor, LevelData};
use jellyfield_render::{InstanceBatch, StreamKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created but not started.
    Ready,
    Playing { wave: usize },
    Victory,
}

/// Level-level notifications, in the order they happened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    WaveStarted { index: usize, enemies: usize },
    Grid(GridEvent),
    LevelComplete,
}

/// One level being played: owns the grid, the projectile pool and both
/// instance batches, and moves through the level's waves.
#[derive(Debug)]
pub struct Session {
    level: LevelData,
    store: EntityStore,
    projectiles: ProjectilePool,
    enemy_batch: InstanceBatch,
    projectile_batch: InstanceBatch,
    enemy_enabled: bool,
    projectile_enabled: bool,
    state: SessionState,
    hammer_charges: u32,
    event_log: Vec<SessionEvent>,
}

impl Session {
    /// Size both streams for `level`. The level is expected to be validated.
    pub fn new(level: LevelData) -> Self {
        let config = level.config.clone();
        let enemy_batch = InstanceBatch::new(StreamKind::Enemy, level.enemy_capacity());
        let projectile_batch =
            InstanceBatch::new(StreamKind::Projectile, config.projectile_pool_size);
        Self {
            store: EntityStore::new(config.clone()),
            projectiles: ProjectilePool::new(&config),
            enemy_batch,
            projectile_batch,
            enemy_enabled: true,
            projectile_enabled: true,
            state: SessionState::Ready,
            hammer_charges: level.hammer_charges,
            event_log: Vec::new(),
            level,
        }
    }

    /// Reset the grid and spawn the first wave. Calling it again restarts
    /// the level.
    pub fn start(&mut self) {
        let origin = self.level.grid_origin;
        self.store
            .initialize(self.level.columns, self.level.rows, origin);
        self.store.drain_events();
        self.store.set_highlight(None);
        self.projectiles.clear();
        self.hammer_charges = self.level.hammer_charges;
        tracing::info!(level = %self.level.name, waves = self.level.waves.len(), "level started");
        self.start_wave(0);
    }

    fn start_wave(&mut self, mut index: usize) {
        loop {
            let Some(wave) = self.level.waves.get(index) else {
                self.state = SessionState::Victory;
                self.event_log.push(SessionEvent::LevelComplete);
                tracing::info!(level = %self.level.name, "level complete");
                return;
            };
            self.store.spawn_wave(&wave.enemies, wave.advance_speed);
            self.state = SessionState::Playing { wave: index };
            self.event_log.push(SessionEvent::WaveStarted {
                index,
                enemies: wave.enemies.len(),
            });
            tracing::info!(wave = index, enemies = wave.enemies.len(), "wave started");
            if self.store.has_alive_entities() {
                break;
            }
            index += 1;
        }
        if self.enemy_enabled {
            self.store.project(&mut self.enemy_batch);
        }
    }

    /// Stop simulating a stream whose render resources are missing.
    pub fn set_stream_enabled(&mut self, kind: StreamKind, enabled: bool) {
        match kind {
            StreamKind::Enemy => self.enemy_enabled = enabled,
            StreamKind::Projectile => self.projectile_enabled = enabled,
        }
        if !enabled {
            tracing::warn!(stream = kind.label(), "stream disabled");
        }
    }

    pub fn stream_enabled(&self, kind: StreamKind) -> bool {
        match kind {
            StreamKind::Enemy => self.enemy_enabled,
            StreamKind::Projectile => self.projectile_enabled,
        }
    }

    /// Advance one frame. Does nothing before `start`. After victory the
    /// streams keep animating so the last deaths and shots play out.
    pub fn tick(&mut self, dt: f32) {
        let wave = match self.state {
            SessionState::Ready => return,
            SessionState::Playing { wave } => Some(wave),
            SessionState::Victory => None,
        };
        if self.enemy_enabled {
            self.store.tick(dt, &mut self.enemy_batch);
        }
        if self.projectile_enabled {
            self.projectiles.tick(dt, &mut self.projectile_batch);
        }
        self.collect_grid_events(wave);
    }

    fn collect_grid_events(&mut self, wave: Option<usize>) {
        let mut cleared = false;
        for event in self.store.drain_events() {
            cleared |= event == GridEvent::WaveCleared;
            self.event_log.push(SessionEvent::Grid(event));
        }
        if let (true, Some(wave)) = (cleared, wave) {
            tracing::info!(wave, "wave cleared");
            self.start_wave(wave + 1);
        }
    }

    /// Use one hammer charge on `color`. Returns `None` without a charge or
    /// outside play, else the number of blocks killed.
    pub fn hammer(&mut self, color: BlockColor) -> Option<u32> {
        if !matches!(self.state, SessionState::Playing { .. }) || self.hammer_charges == 0 {
            return None;
        }
        self.hammer_charges -= 1;
        Some(self.store.hammer_strike(color))
    }

    /// Shoot the lowest block of `color` from `muzzle`: launches a projectile
    /// toward it and applies `damage`. Returns the targeted index.
    pub fn fire(&mut self, color: BlockColor, muzzle: Vec3, damage: u32) -> Option<usize> {
        if !matches!(self.state, SessionState::Playing { .. }) {
            return None;
        }
        let target = self.store.find_bottom_most_by_color(color, muzzle)?;
        let position = self.store.position(target)?;
        if self.projectile_enabled {
            self.projectiles.spawn(muzzle, position, color);
        }
        self.store.try_damage(target, damage);
        Some(target)
    }

    pub fn set_highlight(&mut self, color: Option<BlockColor>) {
        self.store.set_highlight(color);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn level(&self) -> &LevelData {
        &self.level
    }

    pub fn hammer_charges(&self) -> u32 {
        self.hammer_charges
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn projectiles(&self) -> &ProjectilePool {
        &self.projectiles
    }

    pub fn batch(&self, kind: StreamKind) -> &InstanceBatch {
        match kind {
            StreamKind::Enemy => &self.enemy_batch,
            StreamKind::Projectile => &self.projectile_batch,
        }
    }

    /// Mutable access for the upload step, which clears the dirty flag.
    pub fn batch_mut(&mut self, kind: StreamKind) -> &mut InstanceBatch {
        match kind {
            StreamKind::Enemy => &mut self.enemy_batch,
            StreamKind::Projectile => &mut self.projectile_batch,
        }
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.event_log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jellyfield_common::{GameConfig, SpawnDescriptor, Tier, WaveData};

    fn level(waves: Vec<Vec<SpawnDescriptor>>) -> LevelData {
        LevelData {
            name: "test".into(),
            columns: 4,
            rows: 4,
            grid_origin: Vec3::new(0.0, 2.0, 15.0),
            hammer_charges: 1,
            config: GameConfig::default(),
            waves: waves
                .into_iter()
                .map(|enemies| WaveData {
                    advance_speed: 0.0,
                    enemies,
                })
                .collect(),
        }
    }

    fn tiny(x: i32, color: BlockColor) -> SpawnDescriptor {
        SpawnDescriptor::new(x, 0, color, Tier::Tiny)
    }

    #[test]
    fn waves_advance_until_victory() {
        let mut s = Session::new(level(vec![
            vec![tiny(0, BlockColor::Red)],
            vec![tiny(1, BlockColor::Blue), tiny(2, BlockColor::Blue)],
        ]));
        assert_eq!(s.state(), SessionState::Ready);
        s.start();
        assert_eq!(s.state(), SessionState::Playing { wave: 0 });
        assert_eq!(s.batch(StreamKind::Enemy).active_count(), 1);

        assert_eq!(s.fire(BlockColor::Red, Vec3::ZERO, 1), Some(0));
        s.tick(1.0 / 60.0);
        assert_eq!(s.state(), SessionState::Playing { wave: 1 });
        assert_eq!(s.store().alive_count(), 2);

        assert_eq!(s.hammer(BlockColor::Blue), Some(2));
        s.tick(1.0 / 60.0);
        assert_eq!(s.state(), SessionState::Victory);

        let events = s.drain_events();
        assert_eq!(
            events.first(),
            Some(&SessionEvent::WaveStarted { index: 0, enemies: 1 })
        );
        assert_eq!(events.last(), Some(&SessionEvent::LevelComplete));
        let cleared = events
            .iter()
            .filter(|e| **e == SessionEvent::Grid(GridEvent::WaveCleared))
            .count();
        assert_eq!(cleared, 2);
    }

    #[test]
    fn streams_play_out_after_victory() {
        let mut s = Session::new(level(vec![vec![tiny(0, BlockColor::Red)]]));
        s.start();
        assert_eq!(s.fire(BlockColor::Red, Vec3::ZERO, 1), Some(0));
        s.tick(1.0 / 60.0);
        assert_eq!(s.state(), SessionState::Victory);
        assert_eq!(s.batch(StreamKind::Enemy).active_count(), 1);

        for _ in 0..600 {
            s.tick(1.0 / 60.0);
        }
        assert_eq!(s.state(), SessionState::Victory);
        assert!(!s.store().entity(0).unwrap().alive);
        assert_eq!(s.batch(StreamKind::Enemy).active_count(), 0);
        assert_eq!(s.projectiles().live_count(), 0);
        assert_eq!(s.batch(StreamKind::Projectile).active_count(), 0);
        let completes = s
            .drain_events()
            .iter()
            .filter(|e| **e == SessionEvent::LevelComplete)
            .count();
        assert_eq!(completes, 1);
    }

    #[test]
    fn empty_wave_is_skipped() {
        let mut s = Session::new(level(vec![vec![], vec![tiny(0, BlockColor::Green)]]));
        s.start();
        assert_eq!(s.state(), SessionState::Playing { wave: 1 });
        let starts = s
            .drain_events()
            .iter()
            .filter(|e| matches!(e, SessionEvent::WaveStarted { .. }))
            .count();
        assert_eq!(starts, 2);
    }

    #[test]
    fn hammer_needs_a_charge() {
        let mut s = Session::new(level(vec![vec![
            tiny(0, BlockColor::Red),
            tiny(1, BlockColor::Yellow),
        ]]));
        assert_eq!(s.hammer(BlockColor::Red), None);
        s.start();
        assert_eq!(s.hammer(BlockColor::Red), Some(1));
        assert_eq!(s.hammer_charges(), 0);
        assert_eq!(s.hammer(BlockColor::Yellow), None);
        assert_eq!(s.store().alive_count(), 1);
    }

    #[test]
    fn fire_spawns_projectile_toward_target() {
        let mut s = Session::new(level(vec![vec![SpawnDescriptor::new(
            1,
            0,
            BlockColor::Blue,
            Tier::Standard,
        )]]));
        s.start();
        assert_eq!(s.fire(BlockColor::Red, Vec3::ZERO, 5), None);
        assert_eq!(s.fire(BlockColor::Blue, Vec3::ZERO, 5), Some(0));
        assert_eq!(s.projectiles().live_count(), 1);
        assert_eq!(s.store().entity(0).unwrap().current_hp, 15);

        s.tick(1.0 / 60.0);
        assert_eq!(s.batch(StreamKind::Projectile).active_count(), 1);
    }

    #[test]
    fn disabled_stream_is_not_ticked() {
        let mut s = Session::new(level(vec![vec![tiny(0, BlockColor::Red)]]));
        s.start();
        s.set_stream_enabled(StreamKind::Projectile, false);
        s.fire(BlockColor::Red, Vec3::ZERO, 0);
        assert_eq!(s.projectiles().live_count(), 0);
        s.tick(0.1);
        assert_eq!(s.batch(StreamKind::Projectile).active_count(), 0);
        assert!(!s.stream_enabled(StreamKind::Projectile));
    }

    #[test]
    fn batch_capacity_comes_from_level() {
        let big: Vec<_> = (0..4)
            .flat_map(|x| (0..20).map(move |y| SpawnDescriptor::new(x, y, BlockColor::Red, Tier::Tiny)))
            .collect();
        let s = Session::new(level(vec![big]));
        assert_eq!(s.batch(StreamKind::Enemy).capacity(), 80);
        assert_eq!(s.batch(StreamKind::Projectile).capacity(), 256);
    }
}

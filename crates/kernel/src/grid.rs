use crate::events::{DamageRequest, GridEvent};
use glam::{Quat, Vec3};
use jellyfield_common::{BlockColor, GameConfig, SpawnDescriptor, Tier};
use jellyfield_render::{InstanceBatch, InstanceRecord};

/// One grid block.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub grid_x: i32,
    pub grid_y: i32,
    pub color: BlockColor,
    pub tier: Tier,
    pub max_hp: u32,
    pub current_hp: u32,
    pub deform_impact: f32,
    pub death_progress: f32,
    /// Still simulated and drawn. Cleared once the death animation ends.
    pub alive: bool,
    /// Took lethal damage; the death animation is running.
    pub dying: bool,
    pub world_position: Vec3,
    pub target_world_position: Vec3,
    pub fall_velocity: f32,
}

impl Entity {
    fn spawn(desc: &SpawnDescriptor, position: Vec3) -> Self {
        let hp = desc.tier.max_hp();
        Self {
            grid_x: desc.x,
            grid_y: desc.y,
            color: desc.color,
            tier: desc.tier,
            max_hp: hp,
            current_hp: hp,
            deform_impact: 0.0,
            death_progress: 0.0,
            alive: true,
            dying: false,
            world_position: position,
            target_world_position: position,
            fall_velocity: 0.0,
        }
    }

    /// Alive and not yet hit lethally; the only state damage applies to.
    pub fn is_targetable(&self) -> bool {
        self.alive && !self.dying
    }

    pub fn hp_normalized(&self) -> f32 {
        if self.max_hp == 0 {
            0.0
        } else {
            self.current_hp as f32 / self.max_hp as f32
        }
    }
}

/// Fixed-capacity, index-addressed store of the current wave's blocks.
///
/// Indices stay valid for the lifetime of a wave. Operations on an index that
/// is out of range or no longer targetable are silent no-ops.
#[derive(Debug, Clone)]
pub struct EntityStore {
    config: GameConfig,
    entities: Box<[Entity]>,
    columns: u32,
    rows: u32,
    origin: Vec3,
    scroll_offset: f32,
    advance_speed: f32,
    alive_count: usize,
    highlight: Option<BlockColor>,
    event_log: Vec<GridEvent>,
}

impl EntityStore {
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            entities: Box::default(),
            columns: 0,
            rows: 0,
            origin: Vec3::ZERO,
            scroll_offset: 0.0,
            advance_speed: 0.0,
            alive_count: 0,
            highlight: None,
            event_log: Vec::new(),
        }
    }

    /// Set grid dimensions and anchor for a new level. Resets the scroll.
    pub fn initialize(&mut self, columns: u32, rows: u32, origin: Vec3) {
        self.columns = columns;
        self.rows = rows;
        self.origin = origin;
        self.scroll_offset = 0.0;
        tracing::debug!(columns, rows, ?origin, "grid initialized");
    }

    /// Replace every entity with a fresh wave.
    ///
    /// An empty list leaves an empty, already cleared wave and emits nothing.
    pub fn spawn_wave(&mut self, spawns: &[SpawnDescriptor], advance_speed: f32) {
        self.advance_speed = advance_speed;
        self.entities = spawns
            .iter()
            .map(|s| Entity::spawn(s, self.grid_to_world(s.x, s.y)))
            .collect();
        self.alive_count = self.entities.len();
        tracing::info!(enemies = self.alive_count, advance_speed, "wave spawned");
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    /// Number of entities in the current wave, dead ones included.
    pub fn capacity(&self) -> usize {
        self.entities.len()
    }

    /// Entities that are neither dying nor dead.
    pub fn alive_count(&self) -> usize {
        self.alive_count
    }

    pub fn has_alive_entities(&self) -> bool {
        self.alive_count > 0
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }

    pub fn entity(&self, index: usize) -> Option<&Entity> {
        self.entities.get(index)
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// World position of a grid cell at the current scroll offset.
    pub fn grid_to_world(&self, x: i32, y: i32) -> Vec3 {
        let cell = self.config.cell_size;
        let half_width = self.columns.saturating_sub(1) as f32 * cell * 0.5;
        Vec3::new(
            self.origin.x + x as f32 * cell - half_width,
            self.origin.y,
            self.origin.z + y as f32 * cell + self.scroll_offset,
        )
    }

    fn targetable(&self, index: usize) -> Option<&Entity> {
        self.entities.get(index).filter(|e| e.is_targetable())
    }

    /// Deal `amount` damage to the block at `index`.
    ///
    /// Returns true only if this call killed it.
    pub fn try_damage(&mut self, index: usize, amount: u32) -> bool {
        let Some(e) = self
            .entities
            .get_mut(index)
            .filter(|e| e.is_targetable())
        else {
            return false;
        };

        e.current_hp = e.current_hp.saturating_sub(amount);
        e.deform_impact = 1.0;
        self.event_log.push(GridEvent::EntityHit {
            index,
            damage: amount,
        });
        if e.current_hp > 0 {
            return false;
        }

        e.dying = true;
        let (color, position) = (e.color, e.world_position);
        self.alive_count -= 1;
        tracing::debug!(index, %color, remaining = self.alive_count, "block killed");
        self.event_log.push(GridEvent::EntityDied {
            index,
            color,
            position,
        });
        if self.alive_count == 0 {
            self.event_log.push(GridEvent::WaveCleared);
        }
        true
    }

    /// Kill every targetable block of `color`. Returns how many died.
    pub fn hammer_strike(&mut self, color: BlockColor) -> u32 {
        let mut kills = 0;
        for (index, e) in self.entities.iter_mut().enumerate() {
            if !e.is_targetable() || e.color != color {
                continue;
            }
            e.current_hp = 0;
            e.dying = true;
            e.deform_impact = 1.0;
            kills += 1;
            self.event_log.push(GridEvent::EntityDied {
                index,
                color,
                position: e.world_position,
            });
        }
        self.alive_count -= kills as usize;
        tracing::info!(%color, kills, remaining = self.alive_count, "hammer strike");
        if kills > 0 && self.alive_count == 0 {
            self.event_log.push(GridEvent::WaveCleared);
        }
        kills
    }

    /// Apply one external damage request. Returns the number of kills.
    pub fn apply(&mut self, request: DamageRequest) -> u32 {
        match request {
            DamageRequest::Damage { index, amount } => u32::from(self.try_damage(index, amount)),
            DamageRequest::Hammer { color } => self.hammer_strike(color),
        }
    }

    /// Highlight every targetable block of `color`, or none.
    pub fn set_highlight(&mut self, color: Option<BlockColor>) {
        self.highlight = color;
    }

    pub fn highlight(&self) -> Option<BlockColor> {
        self.highlight
    }

    /// The targetable block of `color` in the lowest row, ties broken by the
    /// smallest squared distance to `from`.
    pub fn find_bottom_most_by_color(&self, color: BlockColor, from: Vec3) -> Option<usize> {
        let mut best: Option<(usize, i32, f32)> = None;
        for (i, e) in self.entities.iter().enumerate() {
            if !e.is_targetable() || e.color != color {
                continue;
            }
            let dist_sq = from.distance_squared(e.world_position);
            let better = match best {
                None => true,
                Some((_, y, d)) => e.grid_y < y || (e.grid_y == y && dist_sq < d),
            };
            if better {
                best = Some((i, e.grid_y, dist_sq));
            }
        }
        best.map(|(i, _, _)| i)
    }

    pub fn has_alive_of_color(&self, color: BlockColor) -> bool {
        self.entities
            .iter()
            .any(|e| e.is_targetable() && e.color == color)
    }

    pub fn count_alive_of_color(&self, color: BlockColor) -> usize {
        self.entities
            .iter()
            .filter(|e| e.is_targetable() && e.color == color)
            .count()
    }

    pub fn is_alive(&self, index: usize) -> bool {
        self.targetable(index).is_some()
    }

    /// Current world position; available until the death animation ends.
    pub fn position(&self, index: usize) -> Option<Vec3> {
        self.entities
            .get(index)
            .filter(|e| e.alive)
            .map(|e| e.world_position)
    }

    pub fn color(&self, index: usize) -> Option<BlockColor> {
        self.entities.get(index).filter(|e| e.alive).map(|e| e.color)
    }

    /// Remaining hit points of the current wave's targetable blocks.
    pub fn wave_total_hp(&self) -> u64 {
        self.entities
            .iter()
            .filter(|e| e.is_targetable())
            .map(|e| u64::from(e.current_hp))
            .sum()
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<GridEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Read-only access to the pending events.
    pub fn events(&self) -> &[GridEvent] {
        &self.event_log
    }

    /// Advance the simulation by `dt` seconds and project the result into
    /// `batch`.
    pub fn tick(&mut self, dt: f32, batch: &mut InstanceBatch) {
        let _span = tracing::info_span!("grid_tick").entered();
        self.advance(dt);
        self.decay_deformation(dt);
        self.update_deaths(dt);
        self.apply_gravity(dt);
        self.project(batch);
    }

    fn advance(&mut self, dt: f32) {
        self.scroll_offset -= self.advance_speed * dt;
        for i in 0..self.entities.len() {
            let e = &self.entities[i];
            if !e.alive {
                continue;
            }
            let target = self.grid_to_world(e.grid_x, e.grid_y);
            self.entities[i].target_world_position = target;
        }
    }

    fn decay_deformation(&mut self, dt: f32) {
        let decay = self.config.deform_decay_rate.powf(dt * 60.0);
        for e in self.entities.iter_mut() {
            e.deform_impact *= decay;
            if e.deform_impact < 0.01 {
                e.deform_impact = 0.0;
            }
        }
    }

    fn update_deaths(&mut self, dt: f32) {
        let rate = 1.0 / self.config.death_shrink_duration;
        for i in 0..self.entities.len() {
            let e = &mut self.entities[i];
            if !(e.dying && e.alive) {
                continue;
            }
            e.death_progress += rate * dt;
            if e.death_progress < 1.0 {
                continue;
            }
            e.death_progress = 1.0;
            e.alive = false;
            let (x, y) = (e.grid_x, e.grid_y);
            self.collapse_above(x, y);
        }
    }

    /// Every living block above `(x, y)` in the same column drops one row.
    fn collapse_above(&mut self, x: i32, y: i32) {
        for i in 0..self.entities.len() {
            let e = &self.entities[i];
            if !e.alive || e.grid_x != x || e.grid_y <= y {
                continue;
            }
            let new_y = e.grid_y - 1;
            let target = self.grid_to_world(x, new_y);
            let e = &mut self.entities[i];
            e.grid_y = new_y;
            e.target_world_position = target;
        }
    }

    fn apply_gravity(&mut self, dt: f32) {
        let gravity = self.config.gravity;
        let snap_sq = self.config.snap_threshold_sq;
        for e in self.entities.iter_mut().filter(|e| e.alive) {
            let diff = e.target_world_position - e.world_position;
            let dist_sq = diff.length_squared();
            if dist_sq < snap_sq {
                e.world_position = e.target_world_position;
                e.fall_velocity = 0.0;
                continue;
            }
            e.fall_velocity += gravity * dt;
            let step = e.fall_velocity * dt;
            let dist = dist_sq.sqrt();
            if step >= dist {
                e.world_position = e.target_world_position;
            } else {
                e.world_position += diff / dist * step;
            }
        }
    }

    /// Write one record per living block into `batch` and mark it dirty.
    pub fn project(&self, batch: &mut InstanceBatch) {
        let cell = self.config.cell_size;
        let palette = &self.config.palette;
        batch.clear();
        for e in self.entities.iter().filter(|e| e.alive) {
            let scale = e.tier.footprint() as f32 * cell * 0.45;
            let rotation = if e.dying {
                let degrees = e.death_progress * 360.0 / self.config.death_spin_speed;
                Quat::from_rotation_y(degrees.to_radians())
            } else {
                Quat::IDENTITY
            };
            let highlighted = e.is_targetable() && self.highlight == Some(e.color);

            let mut record = InstanceRecord {
                base_color: palette.color(e.color),
                deform_impact: e.deform_impact,
                hp_normalized: e.hp_normalized(),
                death_progress: e.death_progress,
                highlight_pulse: if highlighted { 1.0 } else { 0.0 },
                ..InstanceRecord::default()
            };
            record.set_transform(e.world_position, rotation, scale);
            if !batch.push(record) {
                break;
            }
        }
        batch.mark_dirty();
        tracing::trace!(active = batch.active_count(), "enemy batch projected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jellyfield_render::StreamKind;
    use jellyfield_common::BlockColor::*;

    const DT: f32 = 1.0 / 60.0;

    fn store(columns: u32, spawns: &[SpawnDescriptor], speed: f32) -> EntityStore {
        let mut s = EntityStore::new(GameConfig::default());
        s.initialize(columns, 8, Vec3::new(0.0, 2.0, 15.0));
        s.spawn_wave(spawns, speed);
        s
    }

    fn std_block(x: i32, y: i32, color: BlockColor) -> SpawnDescriptor {
        SpawnDescriptor::new(x, y, color, Tier::Standard)
    }

    fn batch() -> InstanceBatch {
        InstanceBatch::new(StreamKind::Enemy, 64)
    }

    #[test]
    fn spawn_sets_alive_count() {
        let spawns: Vec<_> = (0..5).map(|x| std_block(x, 0, Red)).collect();
        let s = store(5, &spawns, 0.0);
        assert_eq!(s.alive_count(), 5);
        assert_eq!(s.capacity(), 5);
        assert!(s.events().is_empty());
    }

    #[test]
    fn empty_wave_is_already_cleared() {
        let s = store(4, &[], 1.0);
        assert_eq!(s.alive_count(), 0);
        assert!(!s.has_alive_entities());
        assert!(s.events().is_empty());
    }

    #[test]
    fn damage_clamps_hp_and_reports_kill() {
        let mut s = store(3, &[std_block(0, 0, Red), std_block(1, 0, Blue)], 0.0);
        assert!(!s.try_damage(0, 5));
        assert_eq!(s.entity(0).unwrap().current_hp, 15);
        assert_eq!(s.entity(0).unwrap().deform_impact, 1.0);

        assert!(s.try_damage(0, 500));
        let e = s.entity(0).unwrap();
        assert_eq!(e.current_hp, 0);
        assert!(e.dying && e.alive);
        assert_eq!(s.alive_count(), 1);

        let events = s.drain_events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], GridEvent::EntityHit { index: 0, damage: 5 });
        assert_eq!(events[1], GridEvent::EntityHit { index: 0, damage: 500 });
        assert!(matches!(
            events[2],
            GridEvent::EntityDied { index: 0, color: Red, .. }
        ));
    }

    #[test]
    fn damage_on_dying_or_invalid_is_noop() {
        let mut s = store(3, &[std_block(0, 0, Red), std_block(1, 0, Red)], 0.0);
        assert!(s.try_damage(0, 20));
        s.drain_events();

        assert!(!s.try_damage(0, 20));
        assert!(!s.try_damage(7, 20));
        assert_eq!(s.alive_count(), 1);
        assert!(s.events().is_empty());
    }

    #[test]
    fn last_kill_fires_one_wave_cleared() {
        let mut s = store(3, &[std_block(0, 0, Red), std_block(1, 0, Blue)], 0.0);
        s.try_damage(0, 20);
        s.try_damage(1, 20);
        s.try_damage(1, 20);
        let cleared = s
            .drain_events()
            .into_iter()
            .filter(|e| *e == GridEvent::WaveCleared)
            .count();
        assert_eq!(cleared, 1);
    }

    #[test]
    fn hammer_kills_only_matching_color() {
        let spawns = [
            std_block(0, 0, Red),
            std_block(1, 0, Blue),
            std_block(2, 0, Red),
            std_block(3, 0, Green),
            std_block(0, 1, Red),
        ];
        let mut s = store(4, &spawns, 0.0);
        assert_eq!(s.hammer_strike(Red), 3);
        assert_eq!(s.alive_count(), 2);
        assert_eq!(s.count_alive_of_color(Blue), 1);
        assert_eq!(s.count_alive_of_color(Green), 1);
        assert!(!s.has_alive_of_color(Red));

        let events = s.drain_events();
        assert_eq!(events.len(), 3);
        assert!(events
            .iter()
            .all(|e| matches!(e, GridEvent::EntityDied { color: Red, .. })));
    }

    #[test]
    fn hammer_clearing_grid_fires_wave_cleared_once() {
        let mut s = store(2, &[std_block(0, 0, Yellow), std_block(1, 0, Yellow)], 0.0);
        assert_eq!(s.apply(DamageRequest::Hammer { color: Yellow }), 2);
        assert_eq!(s.apply(DamageRequest::Hammer { color: Yellow }), 0);
        let cleared = s
            .drain_events()
            .iter()
            .filter(|e| **e == GridEvent::WaveCleared)
            .count();
        assert_eq!(cleared, 1);
    }

    #[test]
    fn column_collapse_after_death() {
        let mut s = store(5, &[std_block(2, 0, Red), std_block(2, 1, Red)], 0.0);
        let mut b = batch();
        assert!(s.try_damage(0, 20));

        let mut ticks = 0;
        while s.entity(0).unwrap().death_progress < 1.0 {
            s.tick(DT, &mut b);
            ticks += 1;
            assert!(ticks < 1000);
        }
        assert!(!s.entity(0).unwrap().alive);
        assert_eq!(s.entity(1).unwrap().grid_y, 0);

        for _ in 0..120 {
            s.tick(DT, &mut b);
        }
        let survivor = s.entity(1).unwrap();
        assert_eq!(survivor.world_position, s.grid_to_world(2, 0));
        assert_eq!(survivor.fall_velocity, 0.0);
    }

    #[test]
    fn collapse_is_one_row_per_death() {
        let spawns = [
            std_block(0, 0, Red),
            std_block(0, 3, Blue),
            std_block(1, 5, Green),
        ];
        let mut s = store(2, &spawns, 0.0);
        let mut b = batch();
        s.try_damage(0, 20);
        for _ in 0..60 {
            s.tick(DT, &mut b);
        }
        assert_eq!(s.entity(1).unwrap().grid_y, 2);
        assert_eq!(s.entity(2).unwrap().grid_y, 5);
    }

    #[test]
    fn active_count_tracks_living_entities() {
        let spawns: Vec<_> = (0..4).map(|x| std_block(x, 0, Blue)).collect();
        let mut s = store(4, &spawns, 0.5);
        let mut b = batch();
        s.tick(DT, &mut b);
        assert_eq!(b.active_count(), 4);

        s.try_damage(1, 20);
        s.tick(DT, &mut b);
        assert_eq!(b.active_count(), 4);

        for _ in 0..60 {
            s.tick(DT, &mut b);
            let living = s.entities().iter().filter(|e| e.alive).count();
            assert_eq!(b.active_count(), living);
            assert!(b.active_count() <= b.capacity());
        }
        assert_eq!(b.active_count(), 3);
        assert!(b.is_dirty());
    }

    #[test]
    fn grid_is_centered_on_origin() {
        let s = store(7, &[], 0.0);
        let left = s.grid_to_world(0, 0).x;
        let right = s.grid_to_world(6, 0).x;
        assert!(((left + right) * 0.5 - 0.0).abs() < 1e-5);

        let mut s = EntityStore::new(GameConfig::default());
        s.initialize(4, 4, Vec3::new(3.0, 1.0, 10.0));
        let mid = (s.grid_to_world(0, 2).x + s.grid_to_world(3, 2).x) * 0.5;
        assert!((mid - 3.0).abs() < 1e-5);
        assert_eq!(s.grid_to_world(1, 2).z, 10.0 + 2.0 * 1.2);
    }

    #[test]
    fn scrolling_moves_targets_toward_viewer() {
        let mut s = store(1, &[std_block(0, 0, Green)], 2.0);
        let mut b = batch();
        let z0 = s.entity(0).unwrap().world_position.z;
        for _ in 0..60 {
            s.tick(DT, &mut b);
        }
        assert!((s.scroll_offset() + 2.0).abs() < 1e-3);
        assert!(s.entity(0).unwrap().world_position.z < z0);
    }

    #[test]
    fn deformation_decays_to_zero() {
        let mut s = store(1, &[std_block(0, 0, Green)], 0.0);
        let mut b = batch();
        s.try_damage(0, 1);
        s.tick(DT, &mut b);
        let after_one = s.entity(0).unwrap().deform_impact;
        assert!((after_one - 0.85).abs() < 1e-4);
        for _ in 0..120 {
            s.tick(DT, &mut b);
        }
        assert_eq!(s.entity(0).unwrap().deform_impact, 0.0);
    }

    #[test]
    fn bottom_most_prefers_low_row_then_distance() {
        let spawns = [
            std_block(0, 2, Red),
            std_block(0, 1, Red),
            std_block(3, 1, Red),
            std_block(1, 0, Blue),
        ];
        let s = store(4, &spawns, 0.0);
        let near_right = s.grid_to_world(3, 0);
        assert_eq!(s.find_bottom_most_by_color(Red, near_right), Some(2));
        let near_left = s.grid_to_world(0, 0);
        assert_eq!(s.find_bottom_most_by_color(Red, near_left), Some(1));
        assert_eq!(s.find_bottom_most_by_color(Yellow, near_left), None);
    }

    #[test]
    fn queries_tolerate_stale_indices() {
        let mut s = store(2, &[std_block(0, 0, Red)], 0.0);
        let mut b = batch();
        assert_eq!(s.color(0), Some(Red));
        assert!(s.position(3).is_none());
        s.try_damage(0, 20);
        assert!(!s.is_alive(0));
        assert!(s.position(0).is_some());
        for _ in 0..60 {
            s.tick(DT, &mut b);
        }
        assert!(s.position(0).is_none());
        assert!(s.color(0).is_none());
    }

    #[test]
    fn projection_writes_palette_highlight_and_spin() {
        let mut s = store(2, &[std_block(0, 0, Red), std_block(1, 0, Blue)], 0.0);
        let mut b = batch();
        s.set_highlight(Some(Blue));
        s.try_damage(0, 20);
        s.tick(DT, &mut b);

        let records = b.active();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].base_color, s.config().palette.red);
        assert_eq!(records[0].highlight_pulse, 0.0);
        assert!(records[0].death_progress > 0.0);
        assert_eq!(records[0].hp_normalized, 0.0);
        assert_eq!(records[1].highlight_pulse, 1.0);
        assert_eq!(records[1].hp_normalized, 1.0);

        let scale = records[1].world_matrix().x_axis.length();
        assert!((scale - 1.2 * 0.45).abs() < 1e-5);
    }

    #[test]
    fn wave_total_hp_counts_remaining() {
        let spawns = [
            SpawnDescriptor::new(0, 0, Red, Tier::Tank),
            SpawnDescriptor::new(1, 0, Blue, Tier::Tiny),
        ];
        let mut s = store(2, &spawns, 0.0);
        assert_eq!(s.wave_total_hp(), 121);
        s.try_damage(0, 20);
        s.try_damage(1, 1);
        assert_eq!(s.wave_total_hp(), 100);
    }
}

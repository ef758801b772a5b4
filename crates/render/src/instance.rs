use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Quat, Vec3};

/// One drawable copy of a stream's shared mesh.
///
/// Layout matches the `Instance` struct in the WGSL kernels: two column-major
/// matrices, an RGBA color, then four animation scalars.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceRecord {
    pub world: [[f32; 4]; 4],
    pub inverse_world: [[f32; 4]; 4],
    pub base_color: [f32; 4],
    pub deform_impact: f32,
    pub hp_normalized: f32,
    pub death_progress: f32,
    pub highlight_pulse: f32,
}

const _: () = assert!(std::mem::size_of::<InstanceRecord>() == 160);

impl Default for InstanceRecord {
    fn default() -> Self {
        Self {
            world: Mat4::IDENTITY.to_cols_array_2d(),
            inverse_world: Mat4::IDENTITY.to_cols_array_2d(),
            base_color: [1.0; 4],
            deform_impact: 0.0,
            hp_normalized: 1.0,
            death_progress: 0.0,
            highlight_pulse: 0.0,
        }
    }
}

impl InstanceRecord {
    /// Writes the forward transform and its inverse together.
    pub fn set_transform(&mut self, position: Vec3, rotation: Quat, scale: f32) {
        let world = Mat4::from_scale_rotation_translation(Vec3::splat(scale), rotation, position);
        self.world = world.to_cols_array_2d();
        self.inverse_world = world.inverse().to_cols_array_2d();
    }

    /// Instance origin, read back from the translation column.
    pub fn position(&self) -> Vec3 {
        let t = self.world[3];
        Vec3::new(t[0], t[1], t[2])
    }

    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.world)
    }

    pub fn inverse_matrix(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.inverse_world)
    }
}

/// The two independent instance sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Enemy,
    Projectile,
}

impl StreamKind {
    pub const ALL: [StreamKind; 2] = [Self::Enemy, Self::Projectile];

    pub fn label(self) -> &'static str {
        match self {
            Self::Enemy => "enemy",
            Self::Projectile => "projectile",
        }
    }
}

/// CPU half of an instance stream: a fixed-capacity record array, the number
/// of records written this frame and a dirty flag.
///
/// Capacity is fixed at construction. A new level builds a new batch rather
/// than resizing this one.
#[derive(Debug, Clone)]
pub struct InstanceBatch {
    kind: StreamKind,
    records: Box<[InstanceRecord]>,
    active: usize,
    dirty: bool,
}

impl InstanceBatch {
    pub fn new(kind: StreamKind, capacity: usize) -> Self {
        tracing::debug!(stream = kind.label(), capacity, "instance batch allocated");
        Self {
            kind,
            records: vec![InstanceRecord::default(); capacity].into_boxed_slice(),
            active: 0,
            dirty: false,
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    pub fn active_count(&self) -> usize {
        self.active
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Starts a new projection pass. Previously written records are forgotten.
    pub fn clear(&mut self) {
        self.active = 0;
    }

    /// Appends one record. Returns false when the batch is already full, which
    /// only happens when a level was sized wrongly.
    pub fn push(&mut self, record: InstanceRecord) -> bool {
        if self.active >= self.records.len() {
            debug_assert!(
                false,
                "{} batch overflow: capacity {}",
                self.kind.label(),
                self.records.len()
            );
            tracing::warn!(
                stream = self.kind.label(),
                capacity = self.records.len(),
                "instance batch full, record dropped"
            );
            return false;
        }
        self.records[self.active] = record;
        self.active += 1;
        true
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Records written since the last [`clear`](Self::clear).
    pub fn active(&self) -> &[InstanceRecord] {
        &self.records[..self.active]
    }

    /// Hands out the records that need uploading and clears the dirty flag.
    ///
    /// Returns `None` (and leaves the flag alone) when the batch is clean or
    /// empty.
    pub fn take_upload(&mut self) -> Option<&[InstanceRecord]> {
        if !self.dirty || self.active == 0 {
            return None;
        }
        self.dirty = false;
        Some(&self.records[..self.active])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_tracks_forward() {
        let mut r = InstanceRecord::default();
        let rot = Quat::from_rotation_y(1.1);
        r.set_transform(Vec3::new(3.0, -2.0, 7.5), rot, 0.54);
        let product = r.world_matrix() * r.inverse_matrix();
        assert!(product.abs_diff_eq(Mat4::IDENTITY, 1e-4));
        assert_eq!(r.position(), Vec3::new(3.0, -2.0, 7.5));
    }

    #[test]
    fn push_respects_capacity() {
        let mut batch = InstanceBatch::new(StreamKind::Projectile, 2);
        assert!(batch.push(InstanceRecord::default()));
        assert!(batch.push(InstanceRecord::default()));
        assert_eq!(batch.active_count(), 2);
        batch.clear();
        assert_eq!(batch.active_count(), 0);
        assert_eq!(batch.capacity(), 2);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn overflow_is_dropped_in_release() {
        let mut batch = InstanceBatch::new(StreamKind::Enemy, 1);
        assert!(batch.push(InstanceRecord::default()));
        assert!(!batch.push(InstanceRecord::default()));
        assert_eq!(batch.active_count(), 1);
    }

    #[test]
    fn upload_only_when_dirty_and_nonempty() {
        let mut batch = InstanceBatch::new(StreamKind::Enemy, 4);
        batch.mark_dirty();
        assert!(batch.take_upload().is_none());
        assert!(batch.is_dirty());

        batch.push(InstanceRecord::default());
        assert_eq!(batch.take_upload().map(<[_]>::len), Some(1));
        assert!(!batch.is_dirty());
        assert!(batch.take_upload().is_none());
    }
}

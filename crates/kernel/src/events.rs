use glam::Vec3;
use jellyfield_common::BlockColor;
use serde::{Deserialize, Serialize};

/// Notifications produced by the entity store.
///
/// Appended to the store's event log in the order they happen. Hosts drain
/// the log once per frame; nothing waits on a listener.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GridEvent {
    /// A block took damage and survived or was about to die.
    EntityHit { index: usize, damage: u32 },
    /// A block's hit points reached zero and its death animation started.
    EntityDied {
        index: usize,
        color: BlockColor,
        position: Vec3,
    },
    /// The last living block of the current wave died.
    WaveCleared,
}

/// Externally issued damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DamageRequest {
    /// Apply `amount` damage to the block at `index`.
    Damage { index: usize, amount: u32 },
    /// Kill every living block of `color`.
    Hammer { color: BlockColor },
}

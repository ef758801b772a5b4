//! Simulation kernel: the block grid, the projectile pool and level sequencing.
//!
//! # Invariants
//! - Every living block occupies a distinct cell; grid rows only ever decrease.
//! - Hit points stay within `0..=max_hp`; a dying block always has zero.
//! - After a tick the enemy batch holds exactly one record per living block and
//!   the projectile batch one per live projectile.
//! - Notifications are appended to an event log and drained by the host; the
//!   kernel never calls out.

pub mod events;
pub mod grid;
pub mod projectile;
pub mod session;

pub use events::{DamageRequest, GridEvent};
pub use grid::{Entity, EntityStore};
pub use projectile::{Projectile, ProjectilePool};
pub use session::{Session, SessionEvent, SessionState};

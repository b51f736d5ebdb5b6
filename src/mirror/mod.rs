//! The flat mirror store: recent list, tombstones, flags and image backups.

mod state;
mod storage;

pub use state::{EntryFlags, ImageBackup, MirrorState, TombstoneViolation};
pub use storage::{MirrorError, MirrorStore, MIRROR_FILE};

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod errors;
pub mod id;
pub mod live;
pub mod progress;
pub mod settings;
pub mod stats;
pub mod sync;
pub mod target;

pub use errors::{Result, SyncError};
pub use id::{StableId, layer_id, light_id, stable_hash};
pub use live::{LiveModel, MemoryElement, MemoryModel};
pub use progress::{LogProgress, NoProgress, ProgressReporter, RecordingProgress};
pub use settings::SyncSettings;
pub use stats::{StatsSnapshot, SyncStats};
pub use sync::{NodeKey, NodeKind, PassTimings, SyncNode, SyncRegistry, SyncReport};
pub use target::{AssetHandle, ElementHandle, MemoryScene, TargetScene};

//! vigil-events — Detection event records and persistence.
//!
//! Every classified face becomes one append-only event row plus an
//! optional JPEG crop on disk. Storage failures are reported to the
//! caller but must never take the watch loop down.

pub mod emitter;
pub mod record;
pub mod store;

pub use emitter::EventEmitter;
pub use record::{detection_detail, EventRecord};
pub use store::{EventStore, MemoryEventStore, SqliteEventStore, StorageError};

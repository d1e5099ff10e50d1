//! Persistent stores for the AGRO BOOST backend.
//!
//! Each store owns one redb database file and creates its tables at open
//! time. Values are serialized as JSON. All stores offer `open(dir)` for
//! on-disk operation and `memory()` for tests.
//!
//! Stores:
//! - [`KitStore`]: mutable per-device aggregate (device state store)
//! - [`ReadingStore`]: append-only sensor time series
//! - [`NotificationStore`]: append-only alert/event log with mark-read
//! - [`UserStore`]: account records for the auth layer

pub mod error;
pub mod kits;
pub mod notifications;
pub mod readings;
pub mod users;

pub use error::{Error, Result};
pub use kits::{IrrigationSchedule, Kit, KitPatch, KitStore};
pub use notifications::{Notification, NotificationCategory, NotificationStore};
pub use readings::{Reading, ReadingKind, ReadingStore, ReadingWindow};
pub use users::{User, UserStore};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

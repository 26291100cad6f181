//! Schema, primary-key reservation and the bulk persistence engine (§4.5,
//! §4.6). Everything in this crate talks to a single [`rusqlite::Connection`]
//! — the dialect abstraction exists so the conflict-safe insert SQL can be
//! swapped without touching call sites, not because this crate drives more
//! than one database engine today.

pub mod dialect;
pub mod engine;
pub mod errors;
pub mod queries;
pub mod reservation;
pub mod schema;

pub use dialect::Dialect;
pub use engine::{BulkPersistenceEngine, RunSummary};
pub use errors::{ConsistencyError, DatabaseOperationalError, PersistError, ReservationError};

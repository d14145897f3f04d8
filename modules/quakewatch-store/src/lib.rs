//! Persistence for seismic events and read-only recipient lookups.
//!
//! `DisasterStore` is the seam: `PgStore` talks to Postgres, `MemoryStore`
//! backs tests. Generated SQL only reaches a store as a `ReadOnlyQuery`, which
//! can only be built by `Catalog::validate`.

pub mod guard;
pub mod memory;
pub mod pg;
pub mod traits;

pub use guard::{Catalog, ProjectedColumn, Projection, ReadOnlyQuery};
pub use memory::MemoryStore;
pub use pg::PgStore;
pub use traits::DisasterStore;

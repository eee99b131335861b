//! Test infrastructure shared by unit and integration tests.
//!
//! - `Fixture`: in-memory database seeded with a user, workspace and collection
//! - `assert_invariants`: full structural check of the collection tree
//! - `dump_tables`: byte-level snapshot for rollback assertions

pub mod fixture;
pub mod invariants;

pub use fixture::{EndpointHandle, Fixture, FolderHandle};
pub use invariants::{assert_invariants, check_invariants, dump_tables};

//! SQLite persistence.
//!
//! Every legacy store exposes plain functions over a `&mut SqliteConnection`
//! plus two thin wrappers: a pool-bound `*Store` for reads outside a
//! transaction and a `*Writer` bound to the connection of an in-flight
//! [`WriteTx`]. Stores never touch `collection_items`, never check
//! permissions and never publish events.

pub mod collections;
pub mod db;
pub mod endpoints;
pub mod environments;
pub mod examples;
pub mod folders;
pub mod responses;
pub mod schema;
pub mod types;
pub mod users;
pub mod workspaces;

pub use collections::{CollectionStore, CollectionWriter};
pub use db::{Database, WriteTx};
pub use endpoints::{EndpointStore, EndpointWriter};
pub use environments::{EnvironmentStore, EnvironmentWriter};
pub use examples::{ExampleStore, ExampleWriter};
pub use folders::{FolderStore, FolderWriter};
pub use responses::{ResponseStore, ResponseWriter};
pub use types::*;
pub use users::{UserStore, UserWriter};
pub use workspaces::{WorkspaceStore, WorkspaceWriter};

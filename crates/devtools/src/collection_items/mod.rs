//! The authoritative ordered tree of a collection.
//!
//! Every folder and endpoint is wrapped by one `collection_items` row. Rows
//! sharing `(collection_id, parent_folder_id)` form a scope, and each scope
//! is a doubly linked list through `prev_id`/`next_id`. Legacy rows are
//! rewritten in the same transaction whenever an item changes collection or
//! parent.

pub mod create;
pub mod store;


pub use create::{CreatedEndpoint, DEFAULT_EXAMPLE_NAME, NewEndpoint};
pub use store::{CollectionItemStore, CollectionItemWriter, Placement, Scope, order_scope};

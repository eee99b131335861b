//! Relocation of collection items within and across scopes.
//!
//! [`MoveEngine`] validates a request against the caller's memberships and
//! the current tree, then performs the pointer and legacy-row rewrites in a
//! single write transaction.

pub mod engine;


pub use engine::{MoveEngine, MoveError, MoveOutcome, MoveRequest, move_item};

//! Embedded document store backing the todo repository.

mod collection;
mod engine;
mod pipeline;
mod predicate;
mod wal;

pub use engine::{Store, StoreOptions};

#![forbid(unsafe_code)]

mod store;

pub use store::{SqliteStore, StoreError, UnitStore};

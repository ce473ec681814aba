pub mod bounded;
pub mod error;

pub use bounded::{BoundedStore, Record};
pub use error::StoreError;

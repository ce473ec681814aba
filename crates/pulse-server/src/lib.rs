pub mod handlers;
pub mod relay;
pub mod server;
pub mod sse;
pub mod streams;

pub use relay::{DispatchError, DispatchOutcome, IngestOutcome, Relay};
pub use server::{start, ServerConfig, ServerHandle};

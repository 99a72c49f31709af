//! HTTP inbound adapter exposing the identify endpoint and health probes.

pub mod error;
pub mod health;
pub mod identify;
pub mod state;

pub use error::ApiResult;

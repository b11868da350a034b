//! JSON-RPC API Layer
//!
//! Operator tooling surface for the marketcrawl daemon: task management,
//! record locks, proxy pool inspection.

pub mod error;
pub mod handler;
pub mod rate_limiter;
pub mod server;
pub mod types;

pub use server::{RpcServer, RpcServerConfig};

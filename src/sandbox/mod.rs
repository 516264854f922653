//! Sandbox module containing all execution-related components.

pub mod config;
pub mod executor;
pub mod extract;
pub mod harness;
pub mod io;
pub mod launcher;
pub mod limits;
pub mod validator;

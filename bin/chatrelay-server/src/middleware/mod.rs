//! HTTP middleware stack.

pub mod client;
pub mod cors;
pub mod trace;

pub use client::ClientKey;

//! catalog-backend
//!
//! HTTP adapter for the hosted page index and the vocabulary/collections API.
//! `query` turns filter intent into the engine's request body, `wire` holds
//! the payload shapes, and `client` implements `SearchBackend` over them.
pub mod client;
pub mod query;
pub mod wire;

pub use client::HttpBackend;

#![deny(missing_docs)]
//! `kv_bridge` runs a single key-value store operation described by a
//! loosely-typed JSON request and reports the outcome as a JSON envelope.
//!
//! The pipeline is linear: [`common::Input`] is normalized into a
//! [`request::NormalizedRequest`], which [`dispatch::dispatch`] executes over
//! one short-lived store connection, producing a [`common::Output`].

pub mod common;
pub mod dispatch;
mod error;
pub mod request;
pub mod store;

pub use error::Error;

/// Result type for `kv_bridge`
pub type Result<T> = std::result::Result<T, Error>;

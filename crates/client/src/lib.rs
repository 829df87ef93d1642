//! Network client for itinera.
//!
//! This crate provides the reqwest-backed implementation of the core
//! `Network` seam and URL resolution for inbound request URLs.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, UrlError, resolve};

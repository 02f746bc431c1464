//! Backend for a marketing-operations dashboard.
//!
//! Webhook responses flow through a TTL cache and a shape normalizer before
//! reaching the JSON API; records live in Postgres or an in-process store.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;

//! Infrastructure adapters and runtime bootstrap.

pub mod db;
pub mod error;
pub mod http;
pub mod llm;
pub mod memory;
pub mod telemetry;
pub mod uploads;
pub mod webhook;

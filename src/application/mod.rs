//! Application services layer: normalization, the webhook gateway, paging and services.

pub mod clients;
pub mod competitors;
pub mod creative;
pub mod error;
pub mod feedback;
pub mod gateway;
pub mod ideas;
pub mod input;
pub mod json_repair;
pub mod llm;
pub mod normalize;
pub mod pagination;
pub mod query;
pub mod recommendations;
pub mod repos;
pub mod uploads;

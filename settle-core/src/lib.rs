//! Settle Core
//!
//! Core library for declaring managed ML platform resources and driving them
//! to a settled state

pub mod arn;
pub mod differ;
pub mod effect;
pub mod plan;
pub mod provider;
pub mod resource;
pub mod schema;
pub mod tags;
pub mod waiter;

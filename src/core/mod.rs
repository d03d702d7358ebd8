//! Core graph logic — DSL parsing, parameter expansion, plans, execution.

pub mod error;
pub mod executor;
pub mod graph;
pub mod job;
pub mod params;
pub mod parser;
pub mod plan;
pub mod resolver;
pub mod types;

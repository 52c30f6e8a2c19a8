// laneforge — Free-text workflows to PlantUML BPMN swim-lane diagrams
// License: Apache-2.0

pub mod config;
pub mod logger;
pub mod pipeline;
pub mod plantuml;
pub mod provider;
pub mod render;
pub mod workflow;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

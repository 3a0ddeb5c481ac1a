//! Application services: sequencing, export, rendering and the publish process.

pub mod error;
pub mod export;
pub mod publish;
pub mod render;
pub mod repos;
pub mod sequence;

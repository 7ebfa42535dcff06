// Core composition engine: pure over closed inputs, no suspension points.
pub mod chunks;
pub mod interfaces;
pub mod layer;
pub mod merge;
pub mod models;
pub mod naming;
pub mod plugins;
pub mod resolver;
pub mod rules;

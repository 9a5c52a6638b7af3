pub mod metrics;
pub mod rules;
pub mod scoring;
pub mod strategy;

pub use scoring::{ScoredResult, Scorer};
pub use strategy::StrategyConfig;

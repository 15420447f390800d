pub mod config;
pub mod error;
pub mod export;
pub mod menu;
pub mod metrics;
pub mod mock;
pub mod plot;

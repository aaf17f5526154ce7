pub mod config;
pub mod dashboard;
pub mod export;
pub mod fallback;
pub mod fetch;
pub mod filter;
pub mod metrics;
pub mod model;
pub mod source;

pub mod address;
pub mod api;
pub mod app;
pub mod blockchain;
pub mod bus;
pub mod config;
pub mod metrics;
pub mod relay;

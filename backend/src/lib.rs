//! Client for a tokenized real-estate marketplace: property submission and
//! review, fractional token trading, and per-wallet notification feeds.

pub mod auth;
pub mod chain;
pub mod config;
pub mod detail;
pub mod forms;
pub mod gateway;
pub mod handlers;
pub mod ipfs;
pub mod models;
pub mod oracle;
pub mod session;
pub mod store;
pub mod units;

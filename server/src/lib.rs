pub mod auth;
pub mod config;
pub mod handlers;
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod utils;

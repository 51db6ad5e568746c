pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod policy;
pub mod pricing;
pub mod products;
pub mod seed;
pub mod state;

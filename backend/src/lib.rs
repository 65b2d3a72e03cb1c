pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod escrow;
pub mod ethscriptions;
pub mod marketplace;
pub mod models;
pub mod schema;
pub mod sites;
pub mod store;
pub mod users;

pub mod config;
pub mod db;
pub mod error;
pub mod quiz;
pub mod rate_limit;
pub mod routes;
pub mod state;

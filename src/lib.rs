pub mod analytics;
pub mod cli;
mod cors;
pub mod database;
mod http_err;
pub mod models;
pub mod repos;
pub mod server;

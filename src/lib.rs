pub mod core;
pub mod db;
pub mod gateway;
pub mod jobs;
pub mod models;
pub mod routes;
pub mod services;
pub mod thesis_vault_web_server;

mod access;
mod auth;
mod borrow;
mod health_check;
mod postgrest_gateway;

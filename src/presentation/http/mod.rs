pub mod error_handlers;
pub mod errors;
pub mod health;
pub mod home;
pub mod middleware;
pub mod rest;

pub mod app_state;
pub mod config;
pub mod postgres;
pub mod startup;

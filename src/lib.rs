pub mod config;
pub mod languages;
pub mod locale;
pub mod pipeline;
pub mod server;

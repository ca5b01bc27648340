pub mod config;
pub mod destroy;
pub mod serve;

pub mod destroy;
pub mod state;
pub mod tasks;

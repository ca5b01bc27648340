pub mod config;
pub mod director;
pub mod error;
pub mod fate;
pub mod infrastructure;
pub mod member;
pub mod precedence;
pub mod reporter;
pub mod state;
pub mod task;
pub mod types;

pub use error::{LemurError, Result};
pub use member::Member;

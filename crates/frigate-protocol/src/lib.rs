pub mod config;
pub mod events;
pub mod topics;

pub use config::*;
pub use events::*;

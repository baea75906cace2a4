//! Default topic handlers.
//!
//! They parse the Frigate payload and log a summary. Anything beyond that
//! (storage, sorting clips into folders) plugs in by registering a
//! different factory for the topic.

pub mod config;
pub mod events;

pub use config::FrigateConfigHandler;
pub use events::FrigateEventHandler;

//! Port traits for the collaborators the engine talks to.

pub mod config_port;
pub mod price_port;
pub mod result_store_port;

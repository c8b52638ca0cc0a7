//! Request authentication and authorization

mod basic;
mod gate;

pub use basic::BasicCredentials;
pub use gate::{AccessGate, MAX_PATH_SEGMENTS, PATH_SEPARATOR};

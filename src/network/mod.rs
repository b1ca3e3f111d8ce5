//! Network layer: the listening gateway and per-client connection tasks.

mod connection;
mod gateway;

pub use connection::Connection;
pub use gateway::Gateway;

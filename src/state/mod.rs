//! Process-local state: connection identifiers, the connection registry, and
//! the shared `Hub` handed to every task.

mod conn_id;
mod hub;
mod registry;

pub use conn_id::{ConnId, ConnIdGenerator};
pub use hub::Hub;
pub use registry::{ConnRegistry, Outbound};

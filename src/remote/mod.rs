mod server;
mod session;

pub use server::{AggregateServer, CentralServer, PushTarget};
pub use session::{Credentials, SessionToken};

mod error;
mod message;
mod session;

pub use error::Error;
pub use session::{Session, SessionHandle, Swarm};

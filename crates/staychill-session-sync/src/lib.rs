//! Session synchronization for the StayChill client
//!
//! Keeps multiple running views of the application in agreement about
//! session state: login and logout write durable markers and publish events
//! on a topic bus that holders of in-memory caches subscribe to. The bus is
//! transport-agnostic; any broadcast mechanism can sit behind it.

mod bus;
mod session;

pub use bus::{Bus, TOPIC_SESSION_LOGIN, TOPIC_SESSION_LOGOUT};
pub use session::SessionManager;

//! Per-connection session objects and the topic router that fans events out
//! to them.

pub mod connection;
pub mod router;

pub use connection::{Connection, DeliveryError};
pub use router::TopicRouter;

//! Stream ingestor: long-lived push connection → `WorkQueue` fan-in
//! (§4.1). See [`runner`] for the reconnect/subscribe loop, [`source`]
//! for the wire protocol, [`work_queue`] for the bounded dedup buffer
//! the Scheduler drains each cycle, and [`wss`] for the real transport.

pub mod runner;
pub mod source;
pub mod work_queue;
pub mod wss;

pub use runner::{IngestorRunner, SubscriptionSnapshot};
pub use work_queue::WorkQueue;

//! In-process publish/subscribe event bus used by the file watcher, the
//! automated state-sync engine, and the command orchestrators to
//! communicate without directly depending on one another.

mod bus;
mod stats;
/// Well-known topic name constants.
pub mod topics;

pub use bus::{Event, EventBus, Handler, Subscription};
pub use stats::BusStats;

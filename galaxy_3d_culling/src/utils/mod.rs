//! Small shared containers.

mod slot_pool;

pub use slot_pool::SlotPool;

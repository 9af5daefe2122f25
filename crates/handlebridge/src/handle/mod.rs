//! Handle bookkeeping: allocation, the handle table and lifetime sentinels

mod allocator;
mod sentinel;
mod table;

pub(crate) use allocator::HandleAllocator;
pub use table::{HandleState, HandleStats, Origin, RetentionMode};

pub(crate) use sentinel::{Reclaim, Sentinel};
pub(crate) use table::{HandleTable, ReleaseTicket};

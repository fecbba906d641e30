//! Blocking synchronization primitives built directly on the scheduler's
//! block/unblock operations, rather than busy-waiting.

pub mod lock;
pub mod semaphore;

pub use lock::Lock;
pub use semaphore::Semaphore;

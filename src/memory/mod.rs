/*!
 * Memory Module
 * Page-family allocation over OS virtual-memory pages
 */

pub mod config;
mod macros;
pub mod manager;
pub mod traits;
pub mod types;
pub mod vm;

// Re-export for convenience
pub use config::ManagerConfig;
pub use manager::{BlockIter, MemoryManager, PageIter};
pub use traits::*;
pub use types::*;
pub use vm::{system_page_size, MmapPageSource};

pub mod memory;
pub mod window;

pub use memory::SysinfoMemorySource;
pub use window::{create_window, lost_title};

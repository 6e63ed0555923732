pub mod tasks;

// Re-export the modules
pub use tasks::*;

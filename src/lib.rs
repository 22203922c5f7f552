pub mod config;
pub mod error;
pub mod instrument;
pub mod legacy;
pub mod page;
pub mod replay;

// Re-export the pieces most embedders need
pub use config::{DebugConfig, Module, ModulePlan, Settings};
pub use instrument::{install, DebugContext};
pub use page::Page;

//! Kernel of the bookstore service: layered settings, the module contract and the
//! registry that drives module lifecycles.

pub mod module;
pub mod registry;
pub mod settings;

pub use module::{IndexSpec, InitCtx, Migration, Module};
pub use registry::ModuleRegistry;
pub use settings::Settings;

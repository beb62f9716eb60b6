pub mod error;
pub mod id;
pub mod module;
pub mod request;
pub mod resolve;
pub mod template;
pub mod value;
pub mod version;

// Re-export commonly used types
pub use error::CoreError;
pub use id::{ModuleIndex, TerminalRef, WireIndex};
pub use module::{FieldDef, FieldType, ModuleDefinition, ModuleRegistry, TerminalDef};
pub use request::{CalcResult, CalculationRequest, ReturnType};
pub use resolve::{resolve, SatisfactionState};
pub use template::{FileReference, ModuleInstance, NodeConfig, Template, Wire, TEMPLATE_VERSION};
pub use value::{ConfigValue, FileInfo};
pub use version::version_template;

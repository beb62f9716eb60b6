//! Core error types for dataflow-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of template inspection and configuration validation.
//! Satisfaction resolution and versioning never fail; they degrade instead.

use crate::id::{ModuleIndex, TerminalRef};
use thiserror::Error;

/// Core errors produced by the dataflow-core crate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// A module index points past the end of the template's module list.
    #[error("module index {index} out of range (template has {len} modules)")]
    ModuleOutOfRange { index: ModuleIndex, len: usize },

    /// A module instance refers to a definition missing from the registry.
    #[error("unknown module definition '{id}'")]
    UnknownModule { id: String },

    /// A wire endpoint names a terminal the module definition does not have.
    #[error("terminal {terminal} does not exist on module '{module}'")]
    UnknownTerminal { terminal: TerminalRef, module: String },

    /// A wire joins terminals carrying different datatypes.
    #[error("datatype mismatch on wire {source_terminal} -> {target}: '{source_type}' != '{target_type}'")]
    DatatypeMismatch {
        source_terminal: TerminalRef,
        target: TerminalRef,
        source_type: String,
        target_type: String,
    },

    /// A single-valued input terminal receives more than one wire.
    #[error("input terminal {terminal} accepts one wire but has {count}")]
    ExcessInput { terminal: TerminalRef, count: usize },

    /// The template graph contains a cycle through the given module.
    #[error("cyclic dependency through module {module}")]
    Cycle { module: ModuleIndex },

    /// A literal configuration value does not fit the field's datatype.
    #[error("invalid value for field '{field}' on module {module}: expected {expected}")]
    InvalidConfig {
        module: ModuleIndex,
        field: String,
        expected: String,
    },

    /// A configuration key names neither a field nor an input terminal.
    #[error("unknown config field '{field}' on module {module}")]
    UnknownField { module: ModuleIndex, field: String },
}

//! Index newtypes for template entities.
//!
//! Modules and wires are addressed by their position in a template's
//! `modules` and `wires` arrays. The newtypes keep a [`ModuleIndex`] from
//! being used where a [`WireIndex`] is expected. Both serialize as bare
//! integers, and [`TerminalRef`] serializes as the `[module, "terminal"]`
//! pair used by wires.

use std::fmt;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// Position of a module instance within a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModuleIndex(pub usize);

/// Position of a wire within a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WireIndex(pub usize);

/// A named terminal on a module instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TerminalRef(pub ModuleIndex, pub String);

impl TerminalRef {
    pub fn new(module: usize, terminal: impl Into<String>) -> Self {
        TerminalRef(ModuleIndex(module), terminal.into())
    }

    pub fn module(&self) -> ModuleIndex {
        self.0
    }

    pub fn terminal(&self) -> &str {
        &self.1
    }
}

impl fmt::Display for ModuleIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for WireIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TerminalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0, self.1)
    }
}

// Module positions double as petgraph node indices when a template is
// lifted into a graph.

impl From<NodeIndex<u32>> for ModuleIndex {
    fn from(idx: NodeIndex<u32>) -> Self {
        ModuleIndex(idx.index())
    }
}

impl From<ModuleIndex> for NodeIndex<u32> {
    fn from(idx: ModuleIndex) -> Self {
        NodeIndex::new(idx.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_index_to_node_index_roundtrip() {
        let idx = NodeIndex::<u32>::new(42);
        let module = ModuleIndex::from(idx);
        assert_eq!(module.0, 42);

        let back: NodeIndex<u32> = module.into();
        assert_eq!(back.index(), 42);
    }

    #[test]
    fn terminal_ref_display() {
        assert_eq!(format!("{}", TerminalRef::new(3, "output")), "3.output");
    }

    #[test]
    fn terminal_ref_serializes_as_pair() {
        let terminal = TerminalRef::new(2, "data");
        let json = serde_json::to_string(&terminal).unwrap();
        assert_eq!(json, r#"[2,"data"]"#);

        let back: TerminalRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, terminal);
    }

    #[test]
    fn module_index_works_as_map_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(ModuleIndex(10), "ten");
        map.insert(ModuleIndex(2), "two");
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"2":"two","10":"ten"}"#);

        let back: std::collections::BTreeMap<ModuleIndex, String> =
            serde_json::from_str(&json).unwrap();
        assert_eq!(back[&ModuleIndex(10)], "ten");
    }
}

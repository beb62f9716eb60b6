//! Templates: module/wire dataflow graphs describing a reduction pipeline.
//!
//! A [`Template`] is a value object. The core reads and copies templates but
//! never edits one in place; the builder helpers exist for callers that
//! assemble templates programmatically.
//!
//! Graph queries (processing order, downstream closure) lift the template
//! into a petgraph `DiGraph` whose node indices equal module positions.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::{ModuleIndex, TerminalRef, WireIndex};
use crate::module::ModuleRegistry;
use crate::value::{ConfigValue, FileInfo};

/// Current template definition format.
pub const TEMPLATE_VERSION: &str = "1.0";

fn default_template_version() -> String {
    TEMPLATE_VERSION.to_string()
}

/// Literal configuration of one module instance, keyed by field or
/// terminal id.
pub type NodeConfig = BTreeMap<String, ConfigValue>;

/// A module instance placed in a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleInstance {
    /// Id of the [`ModuleDefinition`](crate::module::ModuleDefinition).
    pub module: String,
    /// Definition version stamped by the versioner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: NodeConfig,
}

impl ModuleInstance {
    pub fn new(module: impl Into<String>) -> Self {
        ModuleInstance {
            module: module.into(),
            version: None,
            title: None,
            config: BTreeMap::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Whether `key` holds a non-null literal.
    pub fn is_configured(&self, key: &str) -> bool {
        self.config.get(key).is_some_and(|v| !v.is_null())
    }
}

/// A directed edge from an output terminal to an input terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wire {
    pub source: TerminalRef,
    pub target: TerminalRef,
}

/// A file selection found in a template's configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReference {
    pub module: ModuleIndex,
    pub field: String,
    pub file: FileInfo,
}

/// A dataflow graph of module instances and wires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument: Option<String>,
    #[serde(default = "default_template_version")]
    pub version: String,
    #[serde(default)]
    pub modules: Vec<ModuleInstance>,
    #[serde(default)]
    pub wires: Vec<Wire>,
}

impl Default for Template {
    fn default() -> Self {
        Template {
            name: None,
            description: None,
            instrument: None,
            version: default_template_version(),
            modules: Vec::new(),
            wires: Vec::new(),
        }
    }
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Builder helpers
    // -----------------------------------------------------------------------

    pub fn add_module(&mut self, instance: ModuleInstance) -> ModuleIndex {
        self.modules.push(instance);
        ModuleIndex(self.modules.len() - 1)
    }

    pub fn add_wire(&mut self, source: TerminalRef, target: TerminalRef) -> WireIndex {
        self.wires.push(Wire { source, target });
        WireIndex(self.wires.len() - 1)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn module(&self, index: ModuleIndex) -> Result<&ModuleInstance, CoreError> {
        self.modules
            .get(index.0)
            .ok_or(CoreError::ModuleOutOfRange {
                index,
                len: self.modules.len(),
            })
    }

    /// Wires terminating on `node`.
    pub fn inputs(&self, node: ModuleIndex) -> impl Iterator<Item = (WireIndex, &Wire)> {
        self.wires
            .iter()
            .enumerate()
            .filter(move |(_, w)| w.target.module() == node)
            .map(|(i, w)| (WireIndex(i), w))
    }

    /// Wires leaving `node`.
    pub fn outputs(&self, node: ModuleIndex) -> impl Iterator<Item = (WireIndex, &Wire)> {
        self.wires
            .iter()
            .enumerate()
            .filter(move |(_, w)| w.source.module() == node)
            .map(|(i, w)| (WireIndex(i), w))
    }

    /// Lifts the template into a graph with one node per module and one
    /// edge per wire. Node indices equal module positions.
    pub fn to_graph(&self) -> Result<DiGraph<ModuleIndex, WireIndex>, CoreError> {
        let len = self.modules.len();
        let mut graph = DiGraph::with_capacity(len, self.wires.len());
        for index in 0..len {
            graph.add_node(ModuleIndex(index));
        }
        for (i, wire) in self.wires.iter().enumerate() {
            for end in [wire.source.module(), wire.target.module()] {
                if end.0 >= len {
                    return Err(CoreError::ModuleOutOfRange { index: end, len });
                }
            }
            graph.add_edge(
                wire.source.module().into(),
                wire.target.module().into(),
                WireIndex(i),
            );
        }
        Ok(graph)
    }

    /// Modules in an order where every wire's source precedes its target.
    ///
    /// With `target`, only the modules needed to evaluate that node are
    /// included; otherwise every module is.
    pub fn processing_order(
        &self,
        target: Option<ModuleIndex>,
    ) -> Result<Vec<ModuleIndex>, CoreError> {
        let graph = self.to_graph()?;
        let Some(target) = target else {
            return topological(&graph);
        };
        self.module(target)?;

        // Upstream closure of the target, walking wires backwards.
        let mut reversed = graph.clone();
        reversed.reverse();
        let mut upstream = BTreeSet::new();
        let mut bfs = Bfs::new(&reversed, target.into());
        while let Some(node) = bfs.next(&reversed) {
            upstream.insert(ModuleIndex::from(node));
        }

        let subgraph = graph.filter_map(
            |idx, weight| upstream.contains(&ModuleIndex::from(idx)).then_some(*weight),
            |_, weight| Some(*weight),
        );
        topological(&subgraph)
    }

    /// `node` plus every module downstream of it.
    pub fn dependents(&self, node: ModuleIndex) -> Result<BTreeSet<ModuleIndex>, CoreError> {
        self.module(node)?;
        let graph = self.to_graph()?;
        let mut found = BTreeSet::new();
        let mut bfs = Bfs::new(&graph, node.into());
        while let Some(idx) = bfs.next(&graph) {
            found.insert(ModuleIndex::from(idx));
        }
        Ok(found)
    }

    /// Checks every wire against the module definitions.
    ///
    /// Sources must be output terminals and targets input terminals of the
    /// same datatype, and single-valued inputs take at most one wire.
    pub fn validate_wires(&self, registry: &ModuleRegistry) -> Result<(), CoreError> {
        let mut fan_in: HashMap<&TerminalRef, usize> = HashMap::new();
        for wire in &self.wires {
            let source_module = self.module(wire.source.module())?;
            let target_module = self.module(wire.target.module())?;
            let source_def =
                registry
                    .get(&source_module.module)
                    .ok_or_else(|| CoreError::UnknownModule {
                        id: source_module.module.clone(),
                    })?;
            let target_def =
                registry
                    .get(&target_module.module)
                    .ok_or_else(|| CoreError::UnknownModule {
                        id: target_module.module.clone(),
                    })?;

            let source_terminal = source_def.output(wire.source.terminal()).ok_or_else(|| {
                CoreError::UnknownTerminal {
                    terminal: wire.source.clone(),
                    module: source_def.id.clone(),
                }
            })?;
            let target_terminal = target_def.input(wire.target.terminal()).ok_or_else(|| {
                CoreError::UnknownTerminal {
                    terminal: wire.target.clone(),
                    module: target_def.id.clone(),
                }
            })?;

            if source_terminal.datatype != target_terminal.datatype {
                return Err(CoreError::DatatypeMismatch {
                    source_terminal: wire.source.clone(),
                    target: wire.target.clone(),
                    source_type: source_terminal.datatype.clone(),
                    target_type: target_terminal.datatype.clone(),
                });
            }

            let count = fan_in.entry(&wire.target).or_default();
            *count += 1;
            if *count > 1 && !target_terminal.multiple {
                return Err(CoreError::ExcessInput {
                    terminal: wire.target.clone(),
                    count: *count,
                });
            }
        }
        Ok(())
    }

    /// File selections held in `fileinfo` fields of the template's own
    /// module configuration. Modules with unknown definitions are skipped.
    pub fn file_references(&self, registry: &ModuleRegistry) -> Vec<FileReference> {
        let mut refs = Vec::new();
        for (index, instance) in self.modules.iter().enumerate() {
            let Some(definition) = registry.get(&instance.module) else {
                continue;
            };
            for field in definition.file_fields() {
                let Some(files) = instance.config.get(&field.id).and_then(ConfigValue::file_infos)
                else {
                    continue;
                };
                refs.extend(files.into_iter().map(|file| FileReference {
                    module: ModuleIndex(index),
                    field: field.id.clone(),
                    file,
                }));
            }
        }
        refs
    }
}

fn topological<E>(graph: &DiGraph<ModuleIndex, E>) -> Result<Vec<ModuleIndex>, CoreError> {
    toposort(graph, None)
        .map(|order| order.into_iter().map(|idx: NodeIndex| graph[idx]).collect())
        .map_err(|cycle| CoreError::Cycle {
            module: graph[cycle.node_id()],
        })
}

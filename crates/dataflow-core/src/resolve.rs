//! Dependency satisfaction.
//!
//! A module is satisfied when every required input is either configured
//! with a non-null literal or fed by a satisfied wire; a wire is satisfied
//! when its source module is. Modules without required inputs seed the
//! propagation, which then walks wires forward from each newly satisfied
//! module. Each module and wire is visited at most once.
//!
//! Resolution never fails. A module whose definition is missing from the
//! registry stays unsatisfied, as does anything that can only be reached
//! through it, and wires pointing outside the template are ignored.

use std::collections::{BTreeSet, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::id::{ModuleIndex, TerminalRef, WireIndex};
use crate::module::ModuleRegistry;
use crate::template::Template;

/// Which parts of a template are ready to be evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SatisfactionState {
    pub satisfied_modules: BTreeSet<ModuleIndex>,
    pub satisfied_wires: BTreeSet<WireIndex>,
    pub satisfied_terminals: BTreeSet<TerminalRef>,
}

impl SatisfactionState {
    pub fn is_module_satisfied(&self, module: ModuleIndex) -> bool {
        self.satisfied_modules.contains(&module)
    }

    pub fn is_wire_satisfied(&self, wire: WireIndex) -> bool {
        self.satisfied_wires.contains(&wire)
    }

    pub fn is_terminal_satisfied(&self, terminal: &TerminalRef) -> bool {
        self.satisfied_terminals.contains(terminal)
    }
}

/// Computes the satisfaction sets of `template` from scratch.
pub fn resolve(template: &Template, registry: &ModuleRegistry) -> SatisfactionState {
    let len = template.modules.len();

    // Required inputs not yet covered, per module. `None` marks a module
    // with an unknown definition.
    let mut missing: Vec<Option<HashSet<&str>>> = template
        .modules
        .iter()
        .map(|instance| {
            let definition = registry.get(&instance.module)?;
            Some(
                definition
                    .required_inputs()
                    .filter(|id| !instance.is_configured(id))
                    .collect(),
            )
        })
        .collect();

    // Outgoing wires per module, skipping wires with a dangling endpoint.
    let mut outgoing: Vec<Vec<WireIndex>> = vec![Vec::new(); len];
    for (i, wire) in template.wires.iter().enumerate() {
        if wire.source.module().0 < len && wire.target.module().0 < len {
            outgoing[wire.source.module().0].push(WireIndex(i));
        }
    }

    let mut state = SatisfactionState::default();
    let mut queue: VecDeque<ModuleIndex> = VecDeque::new();
    for (index, pending) in missing.iter().enumerate() {
        if pending.as_ref().is_some_and(HashSet::is_empty) {
            state.satisfied_modules.insert(ModuleIndex(index));
            queue.push_back(ModuleIndex(index));
        }
    }

    while let Some(module) = queue.pop_front() {
        for &wire_index in &outgoing[module.0] {
            let wire = &template.wires[wire_index.0];
            state.satisfied_wires.insert(wire_index);
            state.satisfied_terminals.insert(wire.source.clone());
            state.satisfied_terminals.insert(wire.target.clone());

            let target = wire.target.module();
            if state.satisfied_modules.contains(&target) {
                continue;
            }
            if let Some(pending) = missing[target.0].as_mut() {
                pending.remove(wire.target.terminal());
                if pending.is_empty() {
                    state.satisfied_modules.insert(target);
                    queue.push_back(target);
                }
            }
        }
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{FieldDef, FieldType, ModuleDefinition, TerminalDef};
    use crate::template::ModuleInstance;

    fn registry() -> ModuleRegistry {
        vec![
            ModuleDefinition::new("loader", "1").with_output(TerminalDef::new("output", "d")),
            ModuleDefinition::new("filter", "1")
                .with_input(TerminalDef::new("data", "d"))
                .with_output(TerminalDef::new("output", "d")),
            ModuleDefinition::new("subtract", "1")
                .with_input(TerminalDef::new("data", "d"))
                .with_input(TerminalDef::new("background", "d"))
                .with_output(TerminalDef::new("output", "d")),
            ModuleDefinition::new("scale", "1")
                .with_input(TerminalDef::new("data", "d"))
                .with_field(FieldDef::new("factor", FieldType::Float))
                .with_output(TerminalDef::new("output", "d")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn loader_is_always_satisfied() {
        let mut t = Template::new();
        t.add_module(ModuleInstance::new("loader"));
        let state = resolve(&t, &registry());
        assert!(state.is_module_satisfied(ModuleIndex(0)));
        assert!(state.satisfied_wires.is_empty());
    }

    #[test]
    fn downstream_of_loader_is_satisfied() {
        let mut t = Template::new();
        let load = t.add_module(ModuleInstance::new("loader"));
        let filter = t.add_module(ModuleInstance::new("filter"));
        let w = t.add_wire(
            TerminalRef(load, "output".into()),
            TerminalRef(filter, "data".into()),
        );

        let state = resolve(&t, &registry());
        assert!(state.is_module_satisfied(filter));
        assert!(state.is_wire_satisfied(w));
        assert!(state.is_terminal_satisfied(&TerminalRef::new(0, "output")));
        assert!(state.is_terminal_satisfied(&TerminalRef::new(1, "data")));
    }

    #[test]
    fn missing_second_input_is_unsatisfied() {
        let mut t = Template::new();
        let load = t.add_module(ModuleInstance::new("loader"));
        let sub = t.add_module(ModuleInstance::new("subtract"));
        t.add_wire(
            TerminalRef(load, "output".into()),
            TerminalRef(sub, "data".into()),
        );

        let state = resolve(&t, &registry());
        assert!(state.is_module_satisfied(load));
        assert!(!state.is_module_satisfied(sub));
        // The wire out of the loader is still satisfied.
        assert_eq!(state.satisfied_wires.len(), 1);
    }

    #[test]
    fn wire_from_unsatisfied_source_does_not_count() {
        let mut t = Template::new();
        let scale = t.add_module(ModuleInstance::new("scale"));
        let filter = t.add_module(ModuleInstance::new("filter"));
        let w = t.add_wire(
            TerminalRef(scale, "output".into()),
            TerminalRef(filter, "data".into()),
        );

        let state = resolve(&t, &registry());
        assert!(!state.is_module_satisfied(scale));
        assert!(!state.is_wire_satisfied(w));
        assert!(!state.is_module_satisfied(filter));
        assert!(state.satisfied_terminals.is_empty());
    }

    #[test]
    fn configured_literal_satisfies_input() {
        let mut t = Template::new();
        t.add_module(
            ModuleInstance::new("scale")
                .with_config("data", vec![1.0, 2.0])
                .with_config("factor", 2.0),
        );
        let state = resolve(&t, &registry());
        assert!(state.is_module_satisfied(ModuleIndex(0)));
    }

    #[test]
    fn null_literal_does_not_satisfy() {
        let mut t = Template::new();
        t.add_module(
            ModuleInstance::new("scale")
                .with_config("data", vec![1.0])
                .with_config("factor", crate::value::ConfigValue::Null),
        );
        let state = resolve(&t, &registry());
        assert!(!state.is_module_satisfied(ModuleIndex(0)));
    }

    #[test]
    fn configuring_input_moves_module_and_wires_to_satisfied() {
        let mut t = Template::new();
        let load = t.add_module(ModuleInstance::new("loader"));
        let scale = t.add_module(ModuleInstance::new("scale"));
        let filter = t.add_module(ModuleInstance::new("filter"));
        t.add_wire(
            TerminalRef(load, "output".into()),
            TerminalRef(scale, "data".into()),
        );
        let out = t.add_wire(
            TerminalRef(scale, "output".into()),
            TerminalRef(filter, "data".into()),
        );

        let before = resolve(&t, &registry());
        assert!(!before.is_module_satisfied(scale));
        assert!(!before.is_wire_satisfied(out));

        t.modules[scale.0].config.insert("factor".into(), 1.5.into());
        let after = resolve(&t, &registry());
        assert!(after.is_module_satisfied(scale));
        assert!(after.is_wire_satisfied(out));
        assert!(after.is_module_satisfied(filter));
        assert!(before.satisfied_modules.is_subset(&after.satisfied_modules));
    }

    #[test]
    fn unknown_module_fails_closed() {
        let mut t = Template::new();
        let mystery = t.add_module(ModuleInstance::new("mystery"));
        let filter = t.add_module(ModuleInstance::new("filter"));
        t.add_wire(
            TerminalRef(mystery, "output".into()),
            TerminalRef(filter, "data".into()),
        );

        let state = resolve(&t, &registry());
        assert!(state.satisfied_modules.is_empty());
        assert!(state.satisfied_wires.is_empty());
    }

    #[test]
    fn dangling_wire_is_ignored() {
        let mut t = Template::new();
        t.add_module(ModuleInstance::new("loader"));
        t.add_wire(TerminalRef::new(0, "output"), TerminalRef::new(5, "data"));

        let state = resolve(&t, &registry());
        assert!(state.is_module_satisfied(ModuleIndex(0)));
        assert!(state.satisfied_wires.is_empty());
    }

    #[test]
    fn cycle_without_seed_stays_unsatisfied() {
        let mut t = Template::new();
        let a = t.add_module(ModuleInstance::new("filter"));
        let b = t.add_module(ModuleInstance::new("filter"));
        t.add_wire(TerminalRef(a, "output".into()), TerminalRef(b, "data".into()));
        t.add_wire(TerminalRef(b, "output".into()), TerminalRef(a, "data".into()));

        let state = resolve(&t, &registry());
        assert!(state.satisfied_modules.is_empty());
    }
}

//! Determinism and sensitivity of request signatures over generated
//! configurations.

use std::collections::BTreeMap;

use dataflow_cache::compute_signature;
use dataflow_core::{
    CalculationRequest, ConfigValue, ModuleDefinition, ModuleIndex, ModuleInstance,
    ModuleRegistry, NodeConfig, ReturnType, Template, TerminalRef,
};
use proptest::prelude::*;

fn registry() -> ModuleRegistry {
    vec![
        ModuleDefinition::new("load", "1"),
        ModuleDefinition::new("scale", "4"),
    ]
    .into_iter()
    .collect()
}

fn config_value() -> impl Strategy<Value = ConfigValue> {
    prop_oneof![
        Just(ConfigValue::Null),
        any::<bool>().prop_map(ConfigValue::Bool),
        any::<i64>().prop_map(ConfigValue::Int),
        (-1e6f64..1e6).prop_map(ConfigValue::Float),
        any::<f64>()
            .prop_filter("finite", |x| x.is_finite())
            .prop_map(ConfigValue::Float),
        "[a-z]{0,8}".prop_map(ConfigValue::Str),
    ]
}

fn pairs() -> impl Strategy<Value = Vec<(String, ConfigValue)>> {
    prop::collection::btree_map("[a-z]{1,6}", config_value(), 0..8)
        .prop_map(|m| m.into_iter().collect())
}

fn build(pairs: &[(String, ConfigValue)]) -> CalculationRequest {
    let mut template = Template::new();
    let load = template.add_module(ModuleInstance::new("load"));
    let mut scale = ModuleInstance::new("scale");
    for (k, v) in pairs {
        scale = scale.with_config(k.clone(), v.clone());
    }
    let scale = template.add_module(scale);
    template.add_wire(
        TerminalRef(load, "output".into()),
        TerminalRef(scale, "data".into()),
    );

    let mut overlay: NodeConfig = BTreeMap::new();
    for (k, v) in pairs.iter().rev() {
        overlay.insert(k.clone(), v.clone());
    }
    CalculationRequest::new(template, scale, "output").with_node_config(scale, overlay)
}

proptest! {
    #[test]
    fn test_insertion_order_does_not_matter(pairs in pairs()) {
        let reversed: Vec<_> = pairs.iter().rev().cloned().collect();
        prop_assert_eq!(
            compute_signature(&build(&pairs), &registry()).unwrap(),
            compute_signature(&build(&reversed), &registry()).unwrap()
        );
    }

    #[test]
    fn test_signature_is_stable_across_serde_roundtrip(pairs in pairs()) {
        let request = build(&pairs);
        let json = serde_json::to_string(&request).unwrap();
        let back: CalculationRequest = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(
            compute_signature(&request, &registry()).unwrap(),
            compute_signature(&back, &registry()).unwrap()
        );
    }

    #[test]
    fn test_single_field_mutation_changes_signature(
        pairs in pairs(),
        terminal in "[a-z]{1,8}",
        concatenate in any::<bool>(),
    ) {
        let base = build(&pairs);
        let base_sig = compute_signature(&base, &registry()).unwrap();

        if terminal != base.terminal {
            let changed = CalculationRequest { terminal, ..base.clone() };
            prop_assert_ne!(compute_signature(&changed, &registry()).unwrap(), base_sig.clone());
        }
        if concatenate != base.concatenate {
            let changed = base.clone().with_concatenate(concatenate);
            prop_assert_ne!(compute_signature(&changed, &registry()).unwrap(), base_sig.clone());
        }
        let changed = base.clone().with_return_type(ReturnType::Full);
        prop_assert_ne!(compute_signature(&changed, &registry()).unwrap(), base_sig.clone());

        let mut extra = base.clone();
        extra.config.insert(ModuleIndex(0), NodeConfig::new());
        prop_assert_ne!(compute_signature(&extra, &registry()).unwrap(), base_sig);
    }
}

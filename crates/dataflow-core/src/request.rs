//! Calculation requests and results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::ModuleIndex;
use crate::template::{NodeConfig, Template};

/// Shape of the result asked of the calculation service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnType {
    Metadata,
    #[default]
    Plottable,
    Full,
    Export,
}

impl ReturnType {
    pub fn as_str(self) -> &'static str {
        match self {
            ReturnType::Metadata => "metadata",
            ReturnType::Plottable => "plottable",
            ReturnType::Full => "full",
            ReturnType::Export => "export",
        }
    }
}

/// A request to evaluate one terminal of one node in a template.
///
/// Every field takes part in the request signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationRequest {
    pub template: Template,
    /// Per-module configuration overlay applied on top of the template.
    #[serde(default)]
    pub config: BTreeMap<ModuleIndex, NodeConfig>,
    pub node: ModuleIndex,
    pub terminal: String,
    #[serde(default)]
    pub return_type: ReturnType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_type: Option<String>,
    #[serde(default)]
    pub concatenate: bool,
}

impl CalculationRequest {
    pub fn new(template: Template, node: ModuleIndex, terminal: impl Into<String>) -> Self {
        CalculationRequest {
            template,
            config: BTreeMap::new(),
            node,
            terminal: terminal.into(),
            return_type: ReturnType::default(),
            export_type: None,
            concatenate: false,
        }
    }

    pub fn with_return_type(mut self, return_type: ReturnType) -> Self {
        self.return_type = return_type;
        self
    }

    pub fn with_export_type(mut self, export_type: impl Into<String>) -> Self {
        self.return_type = ReturnType::Export;
        self.export_type = Some(export_type.into());
        self
    }

    pub fn with_concatenate(mut self, concatenate: bool) -> Self {
        self.concatenate = concatenate;
        self
    }

    pub fn with_node_config(mut self, node: ModuleIndex, config: NodeConfig) -> Self {
        self.config.insert(node, config);
        self
    }
}

/// A result returned by the calculation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalcResult {
    pub datatype: String,
    #[serde(default)]
    pub values: Vec<serde_json::Value>,
}

impl CalcResult {
    pub fn new(datatype: impl Into<String>, values: Vec<serde_json::Value>) -> Self {
        CalcResult {
            datatype: datatype.into(),
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::ModuleInstance;

    #[test]
    fn return_type_is_snake_case() {
        assert_eq!(
            serde_json::to_string(&ReturnType::Plottable).unwrap(),
            r#""plottable""#
        );
        let parsed: ReturnType = serde_json::from_str(r#""metadata""#).unwrap();
        assert_eq!(parsed, ReturnType::Metadata);
        assert_eq!(ReturnType::Full.as_str(), "full");
    }

    #[test]
    fn request_defaults_when_parsing() {
        let request: CalculationRequest = serde_json::from_str(
            r#"{"template": {"modules": [{"module": "load"}]}, "node": 0, "terminal": "output"}"#,
        )
        .unwrap();
        assert_eq!(request.return_type, ReturnType::Plottable);
        assert!(request.config.is_empty());
        assert!(!request.concatenate);
        assert_eq!(request.export_type, None);
    }

    #[test]
    fn export_builder_sets_return_type() {
        let mut template = Template::new();
        let node = template.add_module(ModuleInstance::new("load"));
        let request = CalculationRequest::new(template, node, "output").with_export_type("column");
        assert_eq!(request.return_type, ReturnType::Export);
        assert_eq!(request.export_type.as_deref(), Some("column"));
    }

    #[test]
    fn overlay_config_keys_are_module_indices() {
        let mut overlay = NodeConfig::new();
        overlay.insert("scale".into(), 2.0.into());
        let request = CalculationRequest::new(Template::new(), ModuleIndex(0), "output")
            .with_node_config(ModuleIndex(3), overlay);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["config"]["3"]["scale"], serde_json::json!(2.0));
    }
}

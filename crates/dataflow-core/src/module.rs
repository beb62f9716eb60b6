//! Module definitions and the registry that owns them.
//!
//! A [`ModuleDefinition`] describes one processing step offered by the
//! calculation service: its version, input and output terminals, and the
//! configuration fields it accepts. Definitions are read-only to this crate.
//! The [`ModuleRegistry`] is an explicit value handed to the versioner and
//! the resolver rather than a process-wide table.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::ModuleIndex;
use crate::template::Template;
use crate::value::ConfigValue;

/// Datatype of a configuration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Str,
    Bool,
    Int,
    Float,
    Opt,
    Regex,
    Range,
    Index,
    Coordinate,
    Fileinfo,
    Scale,
    /// Datatype introduced by a newer service; values are not checked.
    #[serde(other)]
    Unknown,
}

impl FieldType {
    /// Datatypes picked interactively from plots (or defaulting to off).
    /// A field of one of these types never blocks evaluation.
    pub fn is_optional(self) -> bool {
        matches!(
            self,
            FieldType::Bool
                | FieldType::Index
                | FieldType::Range
                | FieldType::Coordinate
                | FieldType::Scale
        )
    }

    /// Whether `value` has the shape this datatype expects.
    ///
    /// `null` is always accepted (the field is unset). A list is accepted
    /// when every element is, which covers multi-valued fields.
    pub fn accepts(self, value: &ConfigValue) -> bool {
        match value {
            ConfigValue::Null => true,
            ConfigValue::List(items) if !self.accepts_scalar(value) => {
                items.iter().all(|item| self.accepts(item))
            }
            other => self.accepts_scalar(other),
        }
    }

    fn accepts_scalar(self, value: &ConfigValue) -> bool {
        let is_number = |v: &ConfigValue| v.as_f64().is_some();
        match self {
            FieldType::Str | FieldType::Opt | FieldType::Regex => {
                matches!(value, ConfigValue::Str(_))
            }
            FieldType::Bool => matches!(value, ConfigValue::Bool(_)),
            FieldType::Int | FieldType::Index => matches!(value, ConfigValue::Int(_)),
            FieldType::Float | FieldType::Scale => is_number(value),
            FieldType::Range | FieldType::Coordinate => match value {
                ConfigValue::List(items) => {
                    items.len() == 2 && items.iter().all(|v| v.is_null() || is_number(v))
                }
                _ => false,
            },
            FieldType::Fileinfo => matches!(value, ConfigValue::Map(m) if m.contains_key("path")),
            FieldType::Unknown => true,
        }
    }
}

/// A configuration field on a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub datatype: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ConfigValue>,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl FieldDef {
    pub fn new(id: impl Into<String>, datatype: FieldType) -> Self {
        let id = id.into();
        FieldDef {
            label: id.clone(),
            id,
            datatype,
            default: None,
            multiple: false,
            description: String::new(),
        }
    }

    pub fn with_default(mut self, default: impl Into<ConfigValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// A field is required when it has no usable default and its datatype
    /// is not one of the optional ones.
    pub fn required(&self) -> bool {
        let has_default = self.default.as_ref().is_some_and(|d| !d.is_null());
        !has_default && !self.datatype.is_optional()
    }

    pub fn validate(&self, module: ModuleIndex, value: &ConfigValue) -> Result<(), CoreError> {
        if self.datatype.accepts(value) {
            Ok(())
        } else {
            Err(CoreError::InvalidConfig {
                module,
                field: self.id.clone(),
                expected: format!("{:?}", self.datatype).to_lowercase(),
            })
        }
    }
}

fn required_by_default() -> bool {
    true
}

/// An input or output port on a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalDef {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub datatype: String,
    /// Ignored on output terminals.
    #[serde(default = "required_by_default")]
    pub required: bool,
    #[serde(default)]
    pub multiple: bool,
}

impl TerminalDef {
    pub fn new(id: impl Into<String>, datatype: impl Into<String>) -> Self {
        let id = id.into();
        TerminalDef {
            label: id.clone(),
            id,
            datatype: datatype.into(),
            required: true,
            multiple: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }
}

/// A processing module offered by the calculation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Bumped whenever the computation's results may change.
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub inputs: Vec<TerminalDef>,
    #[serde(default)]
    pub outputs: Vec<TerminalDef>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl ModuleDefinition {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        let id = id.into();
        ModuleDefinition {
            name: id.clone(),
            id,
            version: version.into(),
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn with_input(mut self, terminal: TerminalDef) -> Self {
        self.inputs.push(terminal);
        self
    }

    pub fn with_output(mut self, terminal: TerminalDef) -> Self {
        self.outputs.push(terminal);
        self
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn input(&self, id: &str) -> Option<&TerminalDef> {
        self.inputs.iter().find(|t| t.id == id)
    }

    pub fn output(&self, id: &str) -> Option<&TerminalDef> {
        self.outputs.iter().find(|t| t.id == id)
    }

    pub fn field(&self, id: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Ids of the inputs and fields that must be wired or configured
    /// before the module can be evaluated.
    pub fn required_inputs(&self) -> impl Iterator<Item = &str> {
        let terminals = self
            .inputs
            .iter()
            .filter(|t| t.required)
            .map(|t| t.id.as_str());
        let fields = self
            .fields
            .iter()
            .filter(|f| f.required())
            .map(|f| f.id.as_str());
        terminals.chain(fields)
    }

    /// Fields holding file selections.
    pub fn file_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields
            .iter()
            .filter(|f| f.datatype == FieldType::Fileinfo)
    }
}

/// Module definitions keyed by id, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleRegistry {
    definitions: IndexMap<String, ModuleDefinition>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a definition, returning the one it replaced.
    pub fn register(&mut self, definition: ModuleDefinition) -> Option<ModuleDefinition> {
        self.definitions.insert(definition.id.clone(), definition)
    }

    pub fn get(&self, id: &str) -> Option<&ModuleDefinition> {
        self.definitions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleDefinition> {
        self.definitions.values()
    }

    /// Validates every literal configuration value in `template`.
    ///
    /// Each config key must name a field or an input terminal of the
    /// module's definition, and field values must fit the field datatype.
    pub fn validate_config(&self, template: &Template) -> Result<(), CoreError> {
        for (index, instance) in template.modules.iter().enumerate() {
            let module = ModuleIndex(index);
            let definition = self.get(&instance.module).ok_or_else(|| CoreError::UnknownModule {
                id: instance.module.clone(),
            })?;
            for (key, value) in &instance.config {
                if let Some(field) = definition.field(key) {
                    field.validate(module, value)?;
                } else if definition.input(key).is_none() {
                    return Err(CoreError::UnknownField {
                        module,
                        field: key.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl FromIterator<ModuleDefinition> for ModuleRegistry {
    fn from_iter<I: IntoIterator<Item = ModuleDefinition>>(iter: I) -> Self {
        let mut registry = ModuleRegistry::new();
        for definition in iter {
            registry.register(definition);
        }
        registry
    }
}

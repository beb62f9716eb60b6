//! The seam to the remote calculation service.
//!
//! The wire protocol lives outside this crate. Implementations of
//! [`CalculationService`] and [`ModificationTimeSource`] adapt whatever
//! transport the application uses.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;

use dataflow_core::{
    version_template, CalcResult, CalculationRequest, FileInfo, ModuleIndex, ModuleRegistry,
    NodeConfig, ReturnType, Template,
};

use crate::error::RemoteError;

/// Parameters of one remote `calculate` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteCall {
    pub template_def: Template,
    pub config: BTreeMap<ModuleIndex, NodeConfig>,
    pub nodenum: ModuleIndex,
    pub terminal_id: String,
    pub return_type: ReturnType,
    pub export_type: Option<String>,
    pub concatenate: bool,
}

impl RemoteCall {
    /// Builds the call for `request`, stamping the template with current
    /// module versions.
    pub fn from_request(request: &CalculationRequest, registry: &ModuleRegistry) -> Self {
        RemoteCall {
            template_def: version_template(&request.template, registry),
            config: request.config.clone(),
            nodenum: request.node,
            terminal_id: request.terminal.clone(),
            return_type: request.return_type,
            export_type: request.export_type.clone(),
            concatenate: request.concatenate,
        }
    }
}

/// Evaluates one request at a time.
pub trait CalculationService: Send + Sync {
    fn calculate(
        &self,
        call: &RemoteCall,
    ) -> impl Future<Output = Result<CalcResult, RemoteError>> + Send;
}

impl<S: CalculationService> CalculationService for Arc<S> {
    fn calculate(
        &self,
        call: &RemoteCall,
    ) -> impl Future<Output = Result<CalcResult, RemoteError>> + Send {
        (**self).calculate(call)
    }
}

/// Reports the authoritative modification time of a file on its data
/// source.
pub trait ModificationTimeSource: Send + Sync {
    /// Seconds since the Unix epoch.
    fn modification_time(
        &self,
        file: &FileInfo,
    ) -> impl Future<Output = Result<i64, RemoteError>> + Send;
}

impl<M: ModificationTimeSource> ModificationTimeSource for Arc<M> {
    fn modification_time(
        &self,
        file: &FileInfo,
    ) -> impl Future<Output = Result<i64, RemoteError>> + Send {
        (**self).modification_time(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dataflow_core::{ModuleDefinition, ModuleInstance};

    #[test]
    fn remote_call_carries_versioned_template() {
        let registry: ModuleRegistry = vec![ModuleDefinition::new("load", "5")]
            .into_iter()
            .collect();
        let mut template = Template::new();
        let node = template.add_module(ModuleInstance::new("load"));
        let request = CalculationRequest::new(template, node, "output")
            .with_return_type(ReturnType::Metadata);

        let call = RemoteCall::from_request(&request, &registry);
        assert_eq!(call.template_def.modules[0].version.as_deref(), Some("5"));
        assert_eq!(call.nodenum, node);
        assert_eq!(call.terminal_id, "output");

        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["return_type"], "metadata");
        assert_eq!(json["nodenum"], 0);
    }
}

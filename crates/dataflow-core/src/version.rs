//! Template versioning: stamp every module instance with the current
//! definition version before a template is hashed or sent out.

use crate::module::ModuleRegistry;
use crate::template::Template;

/// Returns a copy of `template` whose module instances carry the version of
/// their definition in `registry`.
///
/// An instance whose module id is not registered gets `version = None`; an
/// unknown module is reported later by the calculation service, not here.
pub fn version_template(template: &Template, registry: &ModuleRegistry) -> Template {
    let mut versioned = template.clone();
    for instance in &mut versioned.modules {
        instance.version = registry
            .get(&instance.module)
            .map(|definition| definition.version.clone());
    }
    versioned
}

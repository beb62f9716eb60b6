//! Refreshing file modification times embedded in requests.
//!
//! File selections record the modification time seen when they were made.
//! When the data source reports a newer file the service rejects the
//! request as stale; refreshing rewrites every recorded time from the
//! authoritative source so the request can be resubmitted.

use std::collections::BTreeMap;

use dataflow_core::{CalculationRequest, ConfigValue, FileInfo, ModuleIndex, ModuleRegistry};

use crate::cancel::CancelToken;
use crate::error::CalcError;
use crate::service::ModificationTimeSource;

/// A file is identified by its data source and path.
type FileKey = (Option<String>, String);

fn key_of(file: &FileInfo) -> FileKey {
    (file.source.clone(), file.path.clone())
}

/// Applies `visit` to every `fileinfo` value in `request`, in the template
/// config and in the per-request overlay.
fn for_each_file_value<F>(request: &mut CalculationRequest, registry: &ModuleRegistry, mut visit: F)
where
    F: FnMut(&mut ConfigValue),
{
    for (index, instance) in request.template.modules.iter_mut().enumerate() {
        let Some(definition) = registry.get(&instance.module) else {
            continue;
        };
        for field in definition.file_fields() {
            if let Some(value) = instance.config.get_mut(&field.id) {
                visit(value);
            }
            let overlay = request
                .config
                .get_mut(&ModuleIndex(index))
                .and_then(|node| node.get_mut(&field.id));
            if let Some(value) = overlay {
                visit(value);
            }
        }
    }
}

/// Refreshes the file times of every request in a batch, querying each
/// distinct file once.
pub async fn refresh_batch<M: ModificationTimeSource>(
    requests: &[CalculationRequest],
    registry: &ModuleRegistry,
    source: &M,
    cancel: &CancelToken,
) -> Result<Vec<CalculationRequest>, CalcError> {
    let mut refreshed = requests.to_vec();

    let mut files: BTreeMap<FileKey, FileInfo> = BTreeMap::new();
    for request in &mut refreshed {
        for_each_file_value(request, registry, |value| {
            for file in value.file_records() {
                files.entry(key_of(&file)).or_insert(file);
            }
        });
    }

    let mut times: BTreeMap<FileKey, i64> = BTreeMap::new();
    for (key, file) in &files {
        if cancel.is_cancelled() {
            return Err(CalcError::Cancelled);
        }
        let mtime = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CalcError::Cancelled),
            result = source.modification_time(file) => result?,
        };
        times.insert(key.clone(), mtime);
    }

    let mut updated = 0;
    for request in &mut refreshed {
        for_each_file_value(request, registry, |value| {
            updated += value.update_file_mtimes(|file| times.get(&key_of(file)).copied());
        });
    }
    tracing::debug!(files = files.len(), updated, "refreshed file modification times");

    Ok(refreshed)
}

/// Returns a copy of `request` with every file modification time replaced
/// by the value reported by `source`.
pub async fn refresh_modification_times<M: ModificationTimeSource>(
    request: &CalculationRequest,
    registry: &ModuleRegistry,
    source: &M,
    cancel: &CancelToken,
) -> Result<CalculationRequest, CalcError> {
    let mut refreshed =
        refresh_batch(std::slice::from_ref(request), registry, source, cancel).await?;
    Ok(refreshed.pop().unwrap_or_else(|| request.clone()))
}

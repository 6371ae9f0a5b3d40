use super::{CapabilityProvider, LensProfile, ResolvedLenses};
use crate::errors::CaptureError;
use std::sync::{Arc, OnceLock};

const TELEPHOTO_INDEX: usize = 2;

lazy_static::lazy_static! {
    static ref PROCESS_LENS_CACHE: LensCache = LensCache::new();
}

/// Resolve only the auxiliary (shortest focal) lens
pub fn resolve_auxiliary_lens(provider: &dyn CapabilityProvider) -> Option<LensProfile> {
    resolve_lenses(provider).map(|lenses| lenses.auxiliary)
}

/// Resolve the auxiliary and telephoto lenses of the main logical camera
///
/// Returns `None` when no rear logical multi-camera exists, none of its
/// physical sensors report a focal length, or any query fails.
pub fn resolve_lenses(provider: &dyn CapabilityProvider) -> Option<ResolvedLenses> {
    match try_resolve(provider) {
        Ok(Some(lenses)) => {
            log::info!(
                "Resolved auxiliary lens {:?} ({}mm), telephoto {:?}",
                lenses.auxiliary.physical_id,
                lenses.auxiliary.focal_length,
                lenses.telephoto.as_ref().map(|t| t.physical_id.clone())
            );
            Some(lenses)
        }
        Ok(None) => None,
        Err(e) => {
            log::error!("Failed to resolve physical lenses: {}", e);
            None
        }
    }
}

fn try_resolve(provider: &dyn CapabilityProvider) -> Result<Option<ResolvedLenses>, CaptureError> {
    let mut main_logical = None;
    for id in provider.list_rear_sensors()? {
        let characteristics = provider.characteristics(&id)?;
        if characteristics.is_logical_multi_camera {
            main_logical = Some(characteristics);
            break;
        }
    }

    let Some(logical) = main_logical else {
        log::warn!("No rear logical multi-camera found, macro lens unavailable");
        return Ok(None);
    };

    let mut candidates = Vec::with_capacity(logical.physical_ids.len());
    for id in &logical.physical_ids {
        let physical = provider.characteristics(id)?;
        let Some(&focal_length) = physical.focal_lengths.first() else {
            log::debug!("Physical sensor {} reports no focal length, skipping", id);
            continue;
        };
        candidates.push(LensProfile {
            physical_id: Some(id.clone()),
            active_array: physical.active_array,
            focal_length,
        });
    }

    candidates.sort_by(|a, b| a.focal_length.total_cmp(&b.focal_length));
    log::info!(
        "Physical lenses by focal length: {:?}",
        candidates
            .iter()
            .map(|c| (c.physical_id.as_deref().unwrap_or("?"), c.focal_length))
            .collect::<Vec<_>>()
    );

    let Some(auxiliary) = candidates.first().cloned() else {
        log::warn!("Logical camera exposes no usable physical sensors");
        return Ok(None);
    };

    let telephoto = candidates.get(TELEPHOTO_INDEX).cloned();
    if telephoto.is_none() {
        log::warn!(
            "Need at least {} physical sensors to identify a telephoto lens, found {}",
            TELEPHOTO_INDEX + 1,
            candidates.len()
        );
    }

    Ok(Some(ResolvedLenses {
        auxiliary,
        telephoto,
        candidates,
    }))
}

/// Resolve-once cache for the lens lookup
///
/// The first call queries the provider; later calls return the same result,
/// including a cached `None`.
#[derive(Debug, Default)]
pub struct LensCache {
    cell: OnceLock<Option<Arc<ResolvedLenses>>>,
}

impl LensCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache shared by the whole process
    pub fn global() -> &'static LensCache {
        &PROCESS_LENS_CACHE
    }

    pub fn get_or_resolve(&self, provider: &dyn CapabilityProvider) -> Option<Arc<ResolvedLenses>> {
        self.cell
            .get_or_init(|| resolve_lenses(provider).map(Arc::new))
            .clone()
    }

    pub fn get(&self) -> Option<Arc<ResolvedLenses>> {
        self.cell.get().cloned().flatten()
    }

    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }
}

//! Model backends compiled into this build

use crate::models::ModelKind;
use tracing::debug;

/// Reports which model backends are usable.
///
/// Each backend sits behind a cargo feature (`seasonal`, `arima`). A backend
/// is registered when its feature is enabled and its default model builds.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRegistry {
    backends: Vec<ModelKind>,
}

impl ModelRegistry {
    /// Registry of every backend compiled into this build
    pub fn new() -> Self {
        let backends: Vec<ModelKind> = ModelKind::ALL
            .into_iter()
            .filter(|kind| backend_ready(*kind))
            .collect();
        debug!(?backends, "model backends registered");
        Self { backends }
    }

    /// Registry limited to the given kinds, in the given order. Kinds whose
    /// backend is not compiled in are dropped.
    pub fn with_kinds(kinds: &[ModelKind]) -> Self {
        let mut backends = Vec::new();
        for kind in kinds {
            if backend_ready(*kind) && !backends.contains(kind) {
                backends.push(*kind);
            }
        }
        Self { backends }
    }

    pub fn is_available(&self, kind: ModelKind) -> bool {
        self.backends.contains(&kind)
    }

    pub fn kinds(&self) -> &[ModelKind] {
        &self.backends
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn backend_ready(kind: ModelKind) -> bool {
    match kind {
        #[cfg(feature = "seasonal")]
        ModelKind::Seasonal => crate::models::seasonal::SeasonalModel::default()
            .config()
            .validate()
            .is_ok(),
        #[cfg(feature = "arima")]
        ModelKind::Arima => true,
        #[allow(unreachable_patterns)]
        _ => false,
    }
}

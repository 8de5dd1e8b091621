use super::storage::PersistedFavorites;
use geogas_lib::{BoundingBox, MapSession};

/// Startup steps that must all complete before markers are computed
///
/// The steps may finish in any order; the first viewport recompute happens
/// once the last one is marked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSequence {
    permissions: bool,
    map_ready: bool,
    data_loaded: bool,
}

impl LoadSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_permissions(&mut self) {
        self.permissions = true;
    }

    pub fn mark_map_ready(&mut self) {
        self.map_ready = true;
    }

    /// Mark the station data as loaded, whether or not the load succeeded
    pub fn mark_data_loaded(&mut self) {
        self.data_loaded = true;
    }

    #[inline]
    pub fn data_loaded(&self) -> bool {
        self.data_loaded
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.permissions && self.map_ready && self.data_loaded
    }
}

/// Last viewport reported by the map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub bbox: BoundingBox,
    pub zoom: f64,
}

/// Application state - owned by the control loop
pub struct AppState {
    /// Station cache, criteria and rendered markers
    pub session: MapSession,
    /// Persisted favorite ids
    pub favorites: PersistedFavorites,
    /// Startup progress
    pub load: LoadSequence,
    /// Latest settled viewport, if any
    pub viewport: Option<Viewport>,
}

impl AppState {
    pub fn new(session: MapSession, favorites: PersistedFavorites) -> Self {
        Self {
            session,
            favorites,
            load: LoadSequence::new(),
            viewport: None,
        }
    }

    /// Whether markers may be computed now
    #[inline]
    pub fn ready(&self) -> bool {
        self.load.is_complete()
    }
}

//! GeoGas Library - Station Selection and Marker Reconciliation
//!
//! This library turns a large, loosely-typed collection of fuel stations into a
//! small, stable set of map markers for the region currently on screen. Every
//! viewport change runs the same pipeline:
//!
//! 1. **[`FilterCriteria`]**: user criteria (location, name prefix, fuels, 24h,
//!    favorites, price ceilings), combined with AND
//! 2. **[`ViewportSelector`]**: inclusive bounding-box scan, ranking through a
//!    [`Scorer`] and truncation to a safety cap
//! 3. **[`MarkerReconciler`]**: keyed diff of the rendered markers against the
//!    new selection, producing create/update/delete operations with an
//!    [`IconTier`] chosen by the [`IconDensityPolicy`]
//!
//! [`MapSession`] ties the stages together and owns the station cache and the
//! rendered marker state. [`ChangeDebouncer`] coalesces bursts of viewport
//! events so that only the last one triggers a recompute.
//!
//! # Error Model
//!
//! Malformed per-station data (unparsable coordinates or prices, missing ids)
//! never fails a batch operation: the affected station is simply excluded from
//! the stage that needs the missing value. [`GeoGasError`] is reserved for
//! whole-operation failures such as an unrecognized feed shape.

mod debounce;
mod favorites;
#[cfg(feature = "serde")]
pub mod feed;
mod filter;
mod icons;
mod reconcile;
mod scorer;
mod session;
mod station;
pub mod utils;
mod viewport;

// Public API exports
pub use debounce::{ChangeDebouncer, DEFAULT_DEBOUNCE};
pub use favorites::{Favorites, FavoritesQuery, FavoritesSet};
pub use filter::{FilterCriteria, FilterEngine, parse_price_ceiling};
pub use icons::{DensityThresholds, IconDensityPolicy, IconResolver, IconTier, MarkerIcon, ResourceNames};
pub use reconcile::{MarkerOp, MarkerReconciler, ReconcilePlan, RenderedMarker, marker_snippet, marker_title, reconcile};
pub use scorer::{RelevanceScorer, ScoreWeights, ScoredStation, Scorer};
pub use session::{CollectionInfo, Config, MapSession, RecomputeOutcome};
pub use station::{FuelKind, Station};
pub use viewport::{BoundingBox, DEFAULT_CAP, ViewportSelector};

/// Error types for the station pipeline
#[derive(Debug, thiserror::Error)]
pub enum GeoGasError {
    #[error("Invalid price input: {0:?}")]
    InvalidPriceInput(String),

    #[error("Unknown fuel kind: {0:?}")]
    UnknownFuelKind(String),

    #[error("Invalid bounding box: {0}")]
    InvalidBoundingBox(String),

    #[error("Unrecognized feed shape: {0}")]
    FeedShape(String),

    #[cfg(feature = "serde")]
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GeoGasError>;

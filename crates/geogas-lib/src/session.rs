//! MapSession - Top-level manager for the station cache, criteria and markers
//!
//! This module provides the high-level API used by a map driver: load the
//! station collection once, then call `recompute()` for every settled
//! viewport and forward the resulting operations to the renderer.

use crate::{
    BoundingBox, FavoritesQuery, FilterCriteria, FilterEngine, IconDensityPolicy, IconTier,
    MarkerReconciler, ReconcilePlan, RelevanceScorer, RenderedMarker, ScoreWeights, Station,
    ViewportSelector, DEFAULT_CAP, DEFAULT_DEBOUNCE,
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

/// Configuration for a map session
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Relevance score weights (default 0.2 / 0.4 / 0.4)
    pub weights: ScoreWeights,
    /// Maximum number of markers materialized per recompute (default 20,000)
    pub cap: usize,
    /// Icon size thresholds
    pub icon_policy: IconDensityPolicy,
    /// Quiescence delay applied by the driver before recomputing (default 300 ms)
    pub debounce: Duration,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Default for Config {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            cap: DEFAULT_CAP,
            icon_policy: IconDensityPolicy::default(),
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Information about the station collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CollectionInfo {
    /// Number of stations loaded
    pub station_count: usize,
    /// Stations with usable coordinates
    pub located_count: usize,
    /// Stations without identifier
    pub unkeyed_count: usize,
}

/// Statistics computed once per station load
#[derive(Debug, Clone, Default)]
struct CachedStats {
    located_count: usize,
    unkeyed_count: usize,
    bounding_box: Option<BoundingBox>,
}

/// Result of a recompute that was not skipped
#[derive(Debug, Clone, PartialEq)]
pub struct RecomputeOutcome {
    /// Operations to forward to the renderer
    pub plan: ReconcilePlan,
    /// Stations passing the filter criteria
    pub filtered: usize,
    /// Stations selected for rendering
    pub total_in_view: usize,
    /// Icon tier applied to every marker
    pub tier: IconTier,
}

/// Station cache plus the rendered marker state of one map
#[derive(Debug, Clone)]
pub struct MapSession {
    /// All loaded stations
    stations: Vec<Station>,
    /// Station index by id, first occurrence wins
    by_id: HashMap<String, usize>,
    criteria: FilterCriteria,
    config: Config,
    reconciler: MarkerReconciler,
    /// Box of the last recompute, `None` when the next one must run
    last_box: Option<BoundingBox>,
    last_zoom: f64,
    last_total_in_view: usize,
    cached_stats: CachedStats,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl MapSession {
    /// Create an empty session with the given configuration
    pub fn new(config: Config) -> Self {
        Self {
            stations: Vec::new(),
            by_id: HashMap::new(),
            criteria: FilterCriteria::default(),
            reconciler: MarkerReconciler::new(config.icon_policy),
            config,
            last_box: None,
            last_zoom: 0.0,
            last_total_in_view: 0,
            cached_stats: CachedStats::default(),
        }
    }

    /// Replace the station collection
    ///
    /// Rendered markers are kept; the next recompute diffs against them.
    pub fn set_stations(&mut self, stations: Vec<Station>) {
        #[cfg(feature = "profiling")]
        profiling::scope!("session::set_stations");

        let mut by_id = HashMap::with_capacity(stations.len());
        for (index, station) in stations.iter().enumerate() {
            if let Some(id) = station.id() {
                by_id.entry(id.to_string()).or_insert(index);
            }
        }

        let positions: Vec<_> = stations.iter().filter_map(Station::position).collect();
        self.cached_stats = CachedStats {
            located_count: positions.len(),
            unkeyed_count: stations.iter().filter(|s| s.id().is_none()).count(),
            bounding_box: BoundingBox::covering(positions),
        };

        tracing::info!(
            stations = stations.len(),
            located = self.cached_stats.located_count,
            unkeyed = self.cached_stats.unkeyed_count,
            "Station collection loaded"
        );

        self.stations = stations;
        self.by_id = by_id;
        self.last_box = None;
    }

    /// Replace the filter criteria; the next recompute always runs
    pub fn set_criteria(&mut self, criteria: FilterCriteria) {
        if criteria != self.criteria {
            self.criteria = criteria;
            self.last_box = None;
        }
    }

    /// Force the next recompute to run even for an unchanged box
    #[inline]
    pub fn invalidate(&mut self) {
        self.last_box = None;
    }

    /// Recompute the markers for a settled viewport
    ///
    /// Returns `None` without doing any work if `bbox` equals the box of the
    /// preceding recompute.
    pub fn recompute<F>(&mut self, bbox: BoundingBox, zoom: f64, favorites: &F) -> Option<RecomputeOutcome>
    where
        F: FavoritesQuery + Sync + ?Sized,
    {
        if self.last_box == Some(bbox) {
            tracing::debug!(%bbox, "Viewport unchanged, recompute skipped");
            return None;
        }
        Some(self.force_recompute(bbox, zoom, favorites))
    }

    /// Recompute the markers for a viewport unconditionally
    pub fn force_recompute<F>(&mut self, bbox: BoundingBox, zoom: f64, favorites: &F) -> RecomputeOutcome
    where
        F: FavoritesQuery + Sync + ?Sized,
    {
        #[cfg(feature = "profiling")]
        profiling::scope!("session::recompute");

        let filtered: Vec<&Station> = if self.criteria.has_active_filters() {
            FilterEngine::apply(&self.stations, &self.criteria, favorites)
        } else {
            self.stations.iter().collect()
        };

        let scorer = RelevanceScorer::new(self.config.weights, favorites);
        let selected = ViewportSelector::new(self.config.cap).select(filtered.iter().copied(), &bbox, &scorer);
        let total_in_view = selected.len();

        let plan = self
            .reconciler
            .sync(selected.iter().copied(), total_in_view, zoom, favorites);
        let tier = self.reconciler.policy().tier(total_in_view, zoom);

        tracing::debug!(
            %bbox,
            zoom,
            filtered = filtered.len(),
            in_view = total_in_view,
            creates = plan.creates.len(),
            updates = plan.updates.len(),
            deletes = plan.deletes.len(),
            icons = tier.describe(),
            "Markers recomputed"
        );

        let filtered = filtered.len();
        self.last_box = Some(bbox);
        self.last_zoom = zoom;
        self.last_total_in_view = total_in_view;

        RecomputeOutcome {
            plan,
            filtered,
            total_in_view,
            tier,
        }
    }

    /// Re-apply favorite state to the rendered markers after a toggle
    ///
    /// With a favorites-only filter active the selection itself may change, so
    /// a full recompute of the last viewport is run instead.
    pub fn refresh_favorites<F>(&mut self, favorites: &F) -> ReconcilePlan
    where
        F: FavoritesQuery + Sync + ?Sized,
    {
        if self.criteria.favorites_only
            && let Some(bbox) = self.last_box
        {
            return self.force_recompute(bbox, self.last_zoom, favorites).plan;
        }
        self.reconciler
            .refresh(self.last_total_in_view, self.last_zoom, favorites)
    }

    /// Delete every rendered marker and forget the last viewport
    pub fn clear_markers(&mut self) -> ReconcilePlan {
        self.last_box = None;
        self.last_total_in_view = 0;
        self.reconciler.clear()
    }

    /// Unique provinces, sorted
    pub fn provinces(&self) -> Vec<String> {
        unique_sorted(self.stations.iter().map(|s| s.province.as_deref()))
    }

    /// Unique municipalities, sorted, optionally restricted to one province
    pub fn municipalities(&self, province: Option<&str>) -> Vec<String> {
        unique_sorted(
            self.stations
                .iter()
                .filter(|s| province.is_none_or(|p| s.province.as_deref() == Some(p)))
                .map(|s| s.municipality.as_deref()),
        )
    }

    /// Unique station names, sorted
    pub fn brands(&self) -> Vec<String> {
        unique_sorted(self.stations.iter().map(|s| s.name.as_deref()))
    }

    /// Look up a station by id
    #[inline]
    pub fn station(&self, id: &str) -> Option<&Station> {
        self.by_id.get(id).map(|&index| &self.stations[index])
    }

    #[inline]
    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    #[inline]
    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Currently rendered station markers, keyed by id
    #[inline]
    pub fn markers(&self) -> &BTreeMap<String, RenderedMarker> {
        self.reconciler.markers()
    }

    #[inline]
    pub fn last_box(&self) -> Option<BoundingBox> {
        self.last_box
    }

    /// Get collection information
    ///
    /// This is O(1) as all values are cached.
    #[inline]
    pub fn info(&self) -> CollectionInfo {
        CollectionInfo {
            station_count: self.stations.len(),
            located_count: self.cached_stats.located_count,
            unkeyed_count: self.cached_stats.unkeyed_count,
        }
    }

    /// Box covering every station with usable coordinates
    #[inline]
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.cached_stats.bounding_box
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

fn unique_sorted<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Vec<String> {
    values
        .flatten()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Favorites, FavoritesSet, FuelKind};

    fn sample_stations() -> Vec<Station> {
        vec![
            Station::new("1")
                .with_name("REPSOL")
                .with_location("MADRID", "Madrid")
                .with_coordinates("40,4168", "-3,7038")
                .with_schedule("24H")
                .with_price(FuelKind::Gasoline95E5, "1,459"),
            Station::new("2")
                .with_name("CEPSA")
                .with_location("MADRID", "Getafe")
                .with_coordinates("40,3083", "-3,7327")
                .with_price(FuelKind::DieselA, "1,389"),
            Station::new("3")
                .with_name("BP")
                .with_location("BARCELONA", "Barcelona")
                .with_coordinates("41,3874", "2,1686"),
            Station::anonymous()
                .with_name("REPSOL")
                .with_location("MADRID", "Madrid")
                .with_coordinates("40,42", "-3,70"),
            Station::new("5").with_name("GALP").with_location("MADRID", "Madrid"),
        ]
    }

    fn madrid() -> BoundingBox {
        BoundingBox::new(40.0, -4.0, 41.0, -3.0).unwrap()
    }

    fn loaded() -> MapSession {
        let mut session = MapSession::new(Config::default());
        session.set_stations(sample_stations());
        session
    }

    #[test]
    fn test_info_and_bounding_box() {
        let session = loaded();
        let info = session.info();
        assert_eq!(info.station_count, 5);
        assert_eq!(info.located_count, 4);
        assert_eq!(info.unkeyed_count, 1);

        let bbox = session.bounding_box().unwrap();
        assert!((bbox.max_lon() - 2.1686).abs() < 1e-9);
        assert!((bbox.min_lat() - 40.3083).abs() < 1e-9);
    }

    #[test]
    fn test_recompute_creates_in_view_markers() {
        let mut session = loaded();
        let favorites = FavoritesSet::new();

        let outcome = session.recompute(madrid(), 12.0, &favorites).unwrap();
        assert_eq!(outcome.total_in_view, 3);
        assert_eq!(outcome.filtered, 5);
        // The anonymous station is selected but never rendered
        assert_eq!(outcome.plan.creates.len(), 2);
        assert_eq!(outcome.tier, IconTier::Normal);
        assert_eq!(session.markers().len(), 2);
    }

    #[test]
    fn test_identical_box_is_skipped() {
        let mut session = loaded();
        let favorites = FavoritesSet::new();

        assert!(session.recompute(madrid(), 12.0, &favorites).is_some());
        assert!(session.recompute(madrid(), 12.0, &favorites).is_none());

        let wider = BoundingBox::new(40.0, -4.0, 42.0, 3.0).unwrap();
        let outcome = session.recompute(wider, 10.0, &favorites).unwrap();
        assert_eq!(outcome.plan.creates.len(), 1);
        assert_eq!(outcome.plan.updates.len(), 2);
    }

    #[test]
    fn test_criteria_change_forces_recompute() {
        let mut session = loaded();
        let favorites = FavoritesSet::new();
        session.recompute(madrid(), 12.0, &favorites);

        session.set_criteria(FilterCriteria::new().open_24h());
        let outcome = session.recompute(madrid(), 12.0, &favorites).unwrap();
        assert_eq!(outcome.plan.deletes, vec!["2".to_string()]);
        assert_eq!(outcome.filtered, 1);

        // Same criteria again keeps the skip
        session.set_criteria(FilterCriteria::new().open_24h());
        assert!(session.recompute(madrid(), 12.0, &favorites).is_none());
    }

    #[test]
    fn test_refresh_favorites() {
        let mut session = loaded();
        let mut favorites = FavoritesSet::new();
        session.recompute(madrid(), 12.0, &favorites);

        favorites.toggle("2").unwrap();
        let plan = session.refresh_favorites(&favorites);
        assert!(plan.creates.is_empty() && plan.deletes.is_empty());
        assert_eq!(plan.updates.len(), 2);
        assert_eq!(session.markers()["2"].title, "★ CEPSA");
    }

    #[test]
    fn test_refresh_with_favorites_only_reselects() {
        let mut session = loaded();
        let mut favorites: FavoritesSet = ["1", "2"].into_iter().collect();
        session.set_criteria(FilterCriteria::new().favorites_only());
        session.recompute(madrid(), 12.0, &favorites);
        assert_eq!(session.markers().len(), 2);

        favorites.toggle("1").unwrap();
        let plan = session.refresh_favorites(&favorites);
        assert_eq!(plan.deletes, vec!["1".to_string()]);
        assert_eq!(session.markers().len(), 1);
    }

    #[test]
    fn test_clear_markers() {
        let mut session = loaded();
        let favorites = FavoritesSet::new();
        session.recompute(madrid(), 12.0, &favorites);

        let plan = session.clear_markers();
        assert_eq!(plan.deletes.len(), 2);
        assert!(session.markers().is_empty());
        assert!(session.recompute(madrid(), 12.0, &favorites).is_some());
    }

    #[test]
    fn test_autocomplete_sources() {
        let session = loaded();
        assert_eq!(session.provinces(), vec!["BARCELONA", "MADRID"]);
        assert_eq!(session.municipalities(Some("MADRID")), vec!["Getafe", "Madrid"]);
        assert_eq!(session.municipalities(None).len(), 3);
        assert_eq!(session.brands(), vec!["BP", "CEPSA", "GALP", "REPSOL"]);
    }

    #[test]
    fn test_station_lookup() {
        let mut stations = sample_stations();
        stations.push(Station::new("1").with_name("SHADOWED"));
        let mut session = MapSession::new(Config::default());
        session.set_stations(stations);

        assert_eq!(session.station("1").unwrap().name.as_deref(), Some("REPSOL"));
        assert!(session.station("404").is_none());
        assert_eq!(session.info().unkeyed_count, 1);
    }

    #[test]
    fn test_cap_applies() {
        let config = Config {
            cap: 1,
            ..Config::default()
        };
        let mut session = MapSession::new(config);
        session.set_stations(sample_stations());
        let outcome = session.recompute(madrid(), 12.0, &FavoritesSet::new()).unwrap();
        assert_eq!(outcome.total_in_view, 1);
    }
}

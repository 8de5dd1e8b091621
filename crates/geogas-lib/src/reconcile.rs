//! Marker reconciliation
//!
//! The renderer never sees the station list. It only receives operations
//! computed by diffing the markers it currently shows (keyed by station id)
//! against the newly selected stations:
//!
//! - id in both: **update** (icon, title and snippet refreshed, position kept)
//! - id only rendered: **delete**
//! - id only selected: **create**
//!
//! Non-station overlays are outside the keyed set and are therefore never
//! touched.

use crate::{FavoritesQuery, FuelKind, IconDensityPolicy, MarkerIcon, Station};
use geo::Point;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Title prefix for favorite stations
const FAVORITE_PREFIX: &str = "★ ";

/// A station marker as last handed to the renderer
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RenderedMarker {
    pub id: String,
    /// x = longitude, y = latitude
    pub position: Point<f64>,
    pub icon: MarkerIcon,
    pub title: String,
    pub snippet: String,
    /// Station name the title is derived from
    #[cfg_attr(feature = "serde", serde(skip))]
    label: String,
}

impl RenderedMarker {
    /// Build the marker for a station, `None` if it has no id or no usable position
    pub fn for_station(station: &Station, icon: MarkerIcon) -> Option<Self> {
        let id = station.id()?.to_string();
        let position = station.position()?;
        let label = station.name.clone().unwrap_or_default();
        Some(Self {
            id,
            position,
            icon,
            title: marker_title(&label, icon.favorite),
            snippet: marker_snippet(station),
            label,
        })
    }

    /// Same marker identity and position with refreshed presentation
    fn refreshed(&self, station: &Station, icon: MarkerIcon) -> Self {
        let label = station.name.clone().unwrap_or_default();
        Self {
            id: self.id.clone(),
            position: self.position,
            icon,
            title: marker_title(&label, icon.favorite),
            snippet: marker_snippet(station),
            label,
        }
    }
}

/// Marker title: the station name, starred for favorites
pub fn marker_title(name: &str, favorite: bool) -> String {
    if favorite {
        format!("{FAVORITE_PREFIX}{name}")
    } else {
        name.to_string()
    }
}

/// Marker snippet: gasoline 95 and road diesel prices when present
pub fn marker_snippet(station: &Station) -> String {
    let mut snippet = String::new();
    if let Some(price) = station.raw_price(FuelKind::Gasoline95E5) {
        snippet.push_str(&format!("95: {price}€\n"));
    }
    if let Some(price) = station.raw_price(FuelKind::DieselA) {
        snippet.push_str(&format!("Diésel: {price}€"));
    }
    snippet
}

/// A single render operation
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "op", rename_all = "snake_case"))]
pub enum MarkerOp {
    Create(RenderedMarker),
    Update(RenderedMarker),
    Delete { id: String },
}

/// Operations turning the rendered marker set into the target set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcilePlan {
    /// Markers kept, in target order
    pub updates: Vec<RenderedMarker>,
    /// Markers added, in target order
    pub creates: Vec<RenderedMarker>,
    /// Ids removed, in ascending id order
    pub deletes: Vec<String>,
}

impl ReconcilePlan {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.creates.is_empty() && self.deletes.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.updates.len() + self.creates.len() + self.deletes.len()
    }

    /// Flatten into render operations: updates, then deletes, then creates
    pub fn ops(&self) -> Vec<MarkerOp> {
        let mut ops = Vec::with_capacity(self.len());
        ops.extend(self.updates.iter().cloned().map(MarkerOp::Update));
        ops.extend(self.deletes.iter().map(|id| MarkerOp::Delete { id: id.clone() }));
        ops.extend(self.creates.iter().cloned().map(MarkerOp::Create));
        ops
    }
}

/// Diff the rendered markers against the target stations
///
/// Target stations without id or without usable position are skipped. When an
/// id occurs more than once, its first occurrence wins.
pub fn reconcile<'a, F: FavoritesQuery + ?Sized>(
    current: &BTreeMap<String, RenderedMarker>,
    target: impl IntoIterator<Item = &'a Station>,
    total_in_view: usize,
    zoom: f64,
    policy: &IconDensityPolicy,
    favorites: &F,
) -> ReconcilePlan {
    #[cfg(feature = "profiling")]
    profiling::scope!("reconcile");

    let tier = policy.tier(total_in_view, zoom);
    let mut plan = ReconcilePlan::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for station in target {
        let Some(id) = station.id() else { continue };
        if station.position().is_none() || !seen.insert(id) {
            continue;
        }
        let icon = MarkerIcon {
            tier,
            favorite: favorites.contains(id),
        };

        match current.get(id) {
            Some(existing) => plan.updates.push(existing.refreshed(station, icon)),
            None => plan.creates.extend(RenderedMarker::for_station(station, icon)),
        }
    }

    plan.deletes = current
        .keys()
        .filter(|id| !seen.contains(id.as_str()))
        .cloned()
        .collect();

    plan
}

/// Owner of the rendered station-marker state
#[derive(Debug, Clone, Default)]
pub struct MarkerReconciler {
    policy: IconDensityPolicy,
    markers: BTreeMap<String, RenderedMarker>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl MarkerReconciler {
    pub fn new(policy: IconDensityPolicy) -> Self {
        Self {
            policy,
            markers: BTreeMap::new(),
        }
    }

    #[inline]
    pub fn policy(&self) -> &IconDensityPolicy {
        &self.policy
    }

    #[inline]
    pub fn markers(&self) -> &BTreeMap<String, RenderedMarker> {
        &self.markers
    }

    #[inline]
    pub fn get(&self, id: &str) -> Option<&RenderedMarker> {
        self.markers.get(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.markers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Compute the plan for a target without applying it
    pub fn plan<'a, F: FavoritesQuery + ?Sized>(
        &self,
        target: impl IntoIterator<Item = &'a Station>,
        total_in_view: usize,
        zoom: f64,
        favorites: &F,
    ) -> ReconcilePlan {
        reconcile(&self.markers, target, total_in_view, zoom, &self.policy, favorites)
    }

    /// Record a plan as applied by the renderer
    pub fn apply(&mut self, plan: &ReconcilePlan) {
        for id in &plan.deletes {
            self.markers.remove(id);
        }
        for marker in plan.updates.iter().chain(&plan.creates) {
            self.markers.insert(marker.id.clone(), marker.clone());
        }
    }

    /// Plan and apply in one step
    pub fn sync<'a, F: FavoritesQuery + ?Sized>(
        &mut self,
        target: impl IntoIterator<Item = &'a Station>,
        total_in_view: usize,
        zoom: f64,
        favorites: &F,
    ) -> ReconcilePlan {
        let plan = self.plan(target, total_in_view, zoom, favorites);
        self.apply(&plan);
        plan
    }

    /// Re-apply favorite state to every rendered marker
    ///
    /// The key set does not change: the result only contains updates.
    pub fn refresh<F: FavoritesQuery + ?Sized>(
        &mut self,
        total_in_view: usize,
        zoom: f64,
        favorites: &F,
    ) -> ReconcilePlan {
        let tier = self.policy.tier(total_in_view, zoom);
        let updates: Vec<RenderedMarker> = self
            .markers
            .values_mut()
            .map(|marker| {
                let favorite = favorites.contains(&marker.id);
                marker.icon = MarkerIcon { tier, favorite };
                marker.title = marker_title(&marker.label, favorite);
                marker.clone()
            })
            .collect();

        ReconcilePlan {
            updates,
            ..ReconcilePlan::default()
        }
    }

    /// Delete every station marker
    pub fn clear(&mut self) -> ReconcilePlan {
        let deletes = std::mem::take(&mut self.markers).into_keys().collect();
        ReconcilePlan {
            deletes,
            ..ReconcilePlan::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FavoritesSet, IconTier};

    fn station(id: &str) -> Station {
        Station::new(id)
            .with_name(format!("Station {id}"))
            .with_coordinates("40,4", "-3,7")
            .with_price(FuelKind::Gasoline95E5, "1,459")
    }

    fn ids(markers: &[RenderedMarker]) -> Vec<&str> {
        markers.iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn test_keyed_diff() {
        let favorites = FavoritesSet::new();
        let mut reconciler = MarkerReconciler::default();
        let (a, b, c) = (station("A"), station("B"), station("C"));

        reconciler.sync([&a, &b], 2, 15.0, &favorites);
        let plan = reconciler.sync([&b, &c], 2, 15.0, &favorites);

        assert_eq!(plan.deletes, vec!["A".to_string()]);
        assert_eq!(ids(&plan.updates), vec!["B"]);
        assert_eq!(ids(&plan.creates), vec!["C"]);
        assert_eq!(
            reconciler.markers().keys().collect::<Vec<_>>(),
            vec!["B", "C"]
        );
    }

    #[test]
    fn test_second_pass_is_idempotent() {
        let favorites: FavoritesSet = ["2"].into_iter().collect();
        let stations: Vec<_> = (1..=5).map(|i| station(&i.to_string())).collect();
        let mut reconciler = MarkerReconciler::default();

        let first = reconciler.sync(&stations, 5, 12.0, &favorites);
        assert_eq!(first.creates.len(), 5);

        let before = reconciler.markers().clone();
        let second = reconciler.sync(&stations, 5, 12.0, &favorites);
        assert!(second.creates.is_empty());
        assert!(second.deletes.is_empty());
        assert_eq!(second.updates.len(), 5);
        assert_eq!(reconciler.markers(), &before);
    }

    #[test]
    fn test_update_keeps_position() {
        let favorites = FavoritesSet::new();
        let mut reconciler = MarkerReconciler::default();
        reconciler.sync([&station("A")], 1, 15.0, &favorites);

        let moved = station("A").with_coordinates("41,0", "-3,0");
        let plan = reconciler.sync([&moved], 1, 15.0, &favorites);
        assert_eq!(plan.updates[0].position, Point::new(-3.7, 40.4));
    }

    #[test]
    fn test_empty_target_deletes_everything() {
        let favorites = FavoritesSet::new();
        let mut reconciler = MarkerReconciler::default();
        reconciler.sync([&station("B"), &station("A")], 2, 15.0, &favorites);

        let plan = reconciler.sync(std::iter::empty::<&Station>(), 0, 15.0, &favorites);
        assert_eq!(plan.deletes, vec!["A".to_string(), "B".to_string()]);
        assert!(plan.updates.is_empty() && plan.creates.is_empty());
        assert!(reconciler.is_empty());
    }

    #[test]
    fn test_skips_unkeyed_and_duplicates() {
        let favorites = FavoritesSet::new();
        let anonymous = Station::anonymous().with_coordinates("40,4", "-3,7");
        let nowhere = Station::new("X");
        let first = station("D").with_name("first");
        let second = station("D").with_name("second");

        let plan = reconcile(
            &BTreeMap::new(),
            [&anonymous, &nowhere, &first, &second],
            4,
            15.0,
            &IconDensityPolicy::default(),
            &favorites,
        );
        assert_eq!(ids(&plan.creates), vec!["D"]);
        assert_eq!(plan.creates[0].title, "first");
    }

    #[test]
    fn test_tier_and_favorite_applied() {
        let favorites: FavoritesSet = ["A"].into_iter().collect();
        let mut reconciler = MarkerReconciler::default();
        let plan = reconciler.sync([&station("A"), &station("B")], 30, 10.0, &favorites);

        let a = &plan.creates[0];
        assert_eq!(a.icon.tier, IconTier::Small);
        assert!(a.icon.favorite);
        assert_eq!(a.title, "★ Station A");
        assert!(!plan.creates[1].icon.favorite);
        assert_eq!(plan.creates[1].title, "Station B");
    }

    #[test]
    fn test_refresh_only_updates() {
        let mut favorites = FavoritesSet::new();
        let mut reconciler = MarkerReconciler::default();
        reconciler.sync([&station("A"), &station("B")], 2, 15.0, &favorites);

        crate::Favorites::toggle(&mut favorites, "B").unwrap();
        let plan = reconciler.refresh(2, 15.0, &favorites);

        assert!(plan.creates.is_empty() && plan.deletes.is_empty());
        assert_eq!(plan.updates.len(), 2);
        assert_eq!(reconciler.get("B").unwrap().title, "★ Station B");
        assert!(reconciler.get("B").unwrap().icon.favorite);
        assert_eq!(reconciler.get("A").unwrap().title, "Station A");
    }

    #[test]
    fn test_snippet_format() {
        let both = station("A").with_price(FuelKind::DieselA, "1,389");
        assert_eq!(marker_snippet(&both), "95: 1,459€\nDiésel: 1,389€");

        let diesel_only = Station::new("B").with_price(FuelKind::DieselA, "1,389");
        assert_eq!(marker_snippet(&diesel_only), "Diésel: 1,389€");
        assert_eq!(marker_snippet(&Station::new("C")), "");
    }

    #[test]
    fn test_ops_order() {
        let plan = ReconcilePlan {
            updates: vec![],
            creates: vec![],
            deletes: vec!["Z".to_string()],
        };
        assert_eq!(plan.ops(), vec![MarkerOp::Delete { id: "Z".to_string() }]);

        let favorites = FavoritesSet::new();
        let mut reconciler = MarkerReconciler::default();
        reconciler.sync([&station("A")], 1, 15.0, &favorites);
        let plan = reconciler.sync([&station("B"), &station("A")], 2, 15.0, &favorites);
        let kinds: Vec<_> = plan
            .ops()
            .iter()
            .map(|op| match op {
                MarkerOp::Create(m) => format!("create {}", m.id),
                MarkerOp::Update(m) => format!("update {}", m.id),
                MarkerOp::Delete { id } => format!("delete {id}"),
            })
            .collect();
        assert_eq!(kinds, vec!["update A", "create B"]);
    }

    #[test]
    fn test_clear() {
        let favorites = FavoritesSet::new();
        let mut reconciler = MarkerReconciler::default();
        reconciler.sync([&station("A")], 1, 15.0, &favorites);
        let plan = reconciler.clear();
        assert_eq!(plan.deletes, vec!["A".to_string()]);
        assert!(reconciler.is_empty());
    }
}

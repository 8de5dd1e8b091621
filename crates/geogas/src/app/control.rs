//! The map control loop
//!
//! Owns the application state and serializes everything that touches it:
//! feed completion, viewport changes, favorite toggles and filter edits.
//! Viewport changes are debounced; every other event is handled at once.

use super::AppError;
use super::loader::LoadResult;
use super::sink::MapSink;
use super::state::{AppState, Viewport};
use geogas_lib::{
    BoundingBox, ChangeDebouncer, Favorites, FilterCriteria, FuelKind, ReconcilePlan, parse_price_ceiling,
};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};

fn default_zoom() -> f64 {
    14.0
}

/// Add a ceiling typed by the user, or report it and leave the fuel uncapped
pub fn apply_price_ceiling(criteria: FilterCriteria, kind: FuelKind, input: &str) -> FilterCriteria {
    match parse_price_ceiling(input) {
        Ok(Some(ceiling)) => criteria.with_price_ceiling(kind, ceiling),
        Ok(None) => criteria,
        Err(e) => {
            tracing::warn!(fuel = %kind, "Ignoring price ceiling: {e}");
            criteria
        }
    }
}

/// A price ceiling as sent by the client, text or number
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CeilingInput {
    Number(f64),
    Text(String),
}

impl fmt::Display for CeilingInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CeilingInput::Number(value) => write!(f, "{value}"),
            CeilingInput::Text(text) => f.write_str(text),
        }
    }
}

/// Filter criteria as received in a `filters` event
///
/// Ceilings stay raw until [`FilterUpdate::into_criteria`], so a bad value
/// only drops that ceiling and never the rest of the update.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FilterUpdate {
    pub province: Option<String>,
    pub municipality: Option<String>,
    pub name_prefix: Option<String>,
    pub required_fuels: BTreeSet<FuelKind>,
    pub open_24h: bool,
    pub favorites_only: bool,
    pub price_ceilings: BTreeMap<FuelKind, CeilingInput>,
}

impl FilterUpdate {
    pub fn into_criteria(self) -> FilterCriteria {
        let mut criteria = FilterCriteria {
            province: self.province,
            municipality: self.municipality,
            name_prefix: self.name_prefix,
            required_fuels: self.required_fuels,
            open_24h: self.open_24h,
            favorites_only: self.favorites_only,
            price_ceilings: BTreeMap::new(),
        };
        for (kind, input) in &self.price_ceilings {
            criteria = apply_price_ceiling(criteria, *kind, &input.to_string());
        }
        criteria
    }
}

/// Events accepted by the control loop, one JSON object per line on stdin
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlEvent {
    /// The visible map region changed
    Viewport {
        min_lat: f64,
        min_lon: f64,
        max_lat: f64,
        max_lon: f64,
        #[serde(default = "default_zoom")]
        zoom: f64,
    },
    /// Flip the favorite state of a station
    ToggleFavorite { id: String },
    /// Replace the filter criteria
    Filters {
        #[serde(default)]
        criteria: FilterUpdate,
    },
    /// Drop every filter
    ClearFilters,
    /// Stop the loop
    Shutdown,
}

pub struct ControlLoop<S: MapSink> {
    state: AppState,
    sink: S,
    debouncer: ChangeDebouncer<Viewport>,
}

impl<S: MapSink> ControlLoop<S> {
    pub fn new(state: AppState, sink: S) -> Self {
        let debouncer = ChangeDebouncer::new(state.session.config().debounce);
        Self {
            state,
            sink,
            debouncer,
        }
    }

    #[inline]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    #[inline]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_parts(self) -> (AppState, S) {
        (self.state, self.sink)
    }

    /// Run until shutdown, or until the event channel is closed and nothing is pending
    pub async fn run(
        &mut self,
        mut load: oneshot::Receiver<LoadResult>,
        mut events: mpsc::Receiver<ControlEvent>,
    ) -> Result<(), AppError> {
        let mut events_open = true;
        loop {
            let deadline = self.debouncer.deadline().map(Instant::from_std);
            tokio::select! {
                biased;
                result = &mut load, if !self.state.load.data_loaded() => {
                    self.on_loaded(result.unwrap_or_else(|_| Err(AppError::LoaderGone)))?;
                }
                event = events.recv(), if events_open => match event {
                    Some(ControlEvent::Shutdown) => {
                        tracing::info!("Shutdown requested");
                        break;
                    }
                    Some(event) => self.handle(event)?,
                    None => {
                        tracing::debug!("Event stream closed");
                        events_open = false;
                    }
                },
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some(viewport) = self.debouncer.poll(Instant::now().into_std()) {
                        self.state.viewport = Some(viewport);
                        self.render()?;
                    }
                }
                else => break,
            }
        }
        Ok(())
    }

    fn on_loaded(&mut self, result: LoadResult) -> Result<(), AppError> {
        match result {
            Ok(stations) => self.state.session.set_stations(stations),
            // The map stays usable, just empty
            Err(e) => tracing::error!("Could not load stations: {e}"),
        }
        self.state.load.mark_data_loaded();

        let info = self.state.session.info();
        tracing::info!(
            stations = info.station_count,
            located = info.located_count,
            unkeyed = info.unkeyed_count,
            "Station data ready"
        );
        self.render()
    }

    fn handle(&mut self, event: ControlEvent) -> Result<(), AppError> {
        match event {
            ControlEvent::Viewport {
                min_lat,
                min_lon,
                max_lat,
                max_lon,
                zoom,
            } => match BoundingBox::new(min_lat, min_lon, max_lat, max_lon) {
                Ok(bbox) => {
                    self.debouncer
                        .schedule(Viewport { bbox, zoom }, Instant::now().into_std());
                }
                Err(e) => tracing::warn!("Ignoring viewport: {e}"),
            },
            ControlEvent::ToggleFavorite { id } => match self.state.favorites.toggle(&id) {
                Ok(favorite) => {
                    tracing::info!(id = %id, favorite, "Favorite toggled");
                    if self.state.ready() {
                        let plan = self.state.session.refresh_favorites(&self.state.favorites);
                        self.emit(&plan)?;
                    }
                }
                Err(e) => tracing::warn!(id = %id, "Could not toggle favorite: {e}"),
            },
            ControlEvent::Filters { criteria } => {
                self.state.session.set_criteria(criteria.into_criteria());
                self.render()?;
            }
            ControlEvent::ClearFilters => {
                self.state.session.set_criteria(FilterCriteria::default());
                self.render()?;
            }
            ControlEvent::Shutdown => {}
        }
        Ok(())
    }

    /// Recompute the markers for the current viewport once startup is complete
    fn render(&mut self) -> Result<(), AppError> {
        if !self.state.ready() {
            tracing::debug!(load = ?self.state.load, "Startup incomplete, render deferred");
            return Ok(());
        }
        let Some(Viewport { bbox, zoom }) = self.state.viewport else {
            return Ok(());
        };

        if let Some(outcome) = self.state.session.recompute(bbox, zoom, &self.state.favorites) {
            tracing::info!(
                filtered = outcome.filtered,
                in_view = outcome.total_in_view,
                icons = outcome.tier.describe(),
                "Viewport rendered"
            );
            self.emit(&outcome.plan)?;
        }
        Ok(())
    }

    fn emit(&mut self, plan: &ReconcilePlan) -> Result<(), AppError> {
        if plan.is_empty() {
            return Ok(());
        }
        self.sink.apply(&plan.ops())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::sink::{MemoryMap, OVERLAYS};
    use crate::app::storage::PersistedFavorites;
    use geogas_lib::{Config, FavoritesQuery, FuelKind, MapSession, Station};
    use std::time::Duration;

    fn stations() -> Vec<Station> {
        vec![
            Station::new("1")
                .with_name("REPSOL")
                .with_coordinates("40,10", "-3,90")
                .with_price(FuelKind::DieselA, "1,389"),
            Station::new("2")
                .with_name("CEPSA")
                .with_coordinates("40,80", "-3,20")
                .with_schedule("24H")
                .with_price(FuelKind::Gasoline95E5, "1,529"),
        ]
    }

    fn control() -> ControlLoop<MemoryMap> {
        let mut state = AppState::new(MapSession::new(Config::default()), PersistedFavorites::in_memory());
        state.load.mark_permissions();
        state.load.mark_map_ready();
        ControlLoop::new(state, MemoryMap::default())
    }

    fn viewport(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> ControlEvent {
        ControlEvent::Viewport {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
            zoom: 12.0,
        }
    }

    fn loaded(stations: Vec<Station>) -> oneshot::Receiver<LoadResult> {
        let (tx, rx) = oneshot::channel();
        tx.send(Ok(stations)).unwrap();
        rx
    }

    /// Send events `gap` apart, then close the channel
    fn feed_events(events: Vec<ControlEvent>, gap: Duration) -> mpsc::Receiver<ControlEvent> {
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    break;
                }
                tokio::time::sleep(gap).await;
            }
        });
        rx
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_renders_last_viewport_only() {
        let mut control = control();
        let events = feed_events(
            vec![
                viewport(40.0, -4.0, 40.5, -3.5),
                viewport(40.2, -3.8, 40.7, -3.3),
                viewport(40.5, -3.5, 41.0, -3.0),
            ],
            Duration::from_millis(50),
        );
        control.run(loaded(stations()), events).await.unwrap();

        let map = control.sink();
        // Station 1 was never created, only 2
        assert_eq!(map.markers.keys().collect::<Vec<_>>(), vec!["2"]);
        assert_eq!(map.applied, 1);
        assert_eq!(map.overlays, OVERLAYS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_render_waits_for_data() {
        let mut control = control();
        let (tx, load) = oneshot::channel();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            tx.send(Ok(stations())).unwrap();
        });
        let events = feed_events(vec![viewport(40.0, -4.0, 41.0, -3.0)], Duration::ZERO);

        control.run(load, events).await.unwrap();

        assert!(control.state().load.is_complete());
        assert_eq!(control.sink().markers.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_load_still_completes() {
        let mut control = control();
        let (tx, load) = oneshot::channel::<LoadResult>();
        drop(tx);
        let events = feed_events(vec![viewport(40.0, -4.0, 41.0, -3.0)], Duration::ZERO);

        control.run(load, events).await.unwrap();

        assert!(control.state().load.data_loaded());
        assert!(control.state().session.is_empty());
        assert!(control.sink().markers.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_favorite_updates_marker() {
        let mut control = control();
        let events = feed_events(
            vec![
                viewport(40.0, -4.0, 41.0, -3.0),
                ControlEvent::ToggleFavorite { id: "1".to_string() },
            ],
            Duration::from_secs(1),
        );
        control.run(loaded(stations()), events).await.unwrap();

        let marker = &control.sink().markers["1"];
        assert!(marker.icon.favorite);
        assert!(marker.title.starts_with("★ "));
        assert!(control.state().favorites.contains("1"));
        assert!(!control.sink().markers["2"].icon.favorite);
    }

    #[tokio::test(start_paused = true)]
    async fn test_filters_apply_immediately() {
        let mut control = control();
        let events = feed_events(
            vec![
                viewport(40.0, -4.0, 41.0, -3.0),
                ControlEvent::Filters {
                    criteria: FilterUpdate {
                        required_fuels: BTreeSet::from([FuelKind::DieselA]),
                        ..FilterUpdate::default()
                    },
                },
            ],
            Duration::from_secs(1),
        );
        control.run(loaded(stations()), events).await.unwrap();
        assert_eq!(control.sink().markers.keys().collect::<Vec<_>>(), vec!["1"]);

        let events = feed_events(vec![ControlEvent::ClearFilters], Duration::ZERO);
        control.run(loaded(Vec::new()), events).await.unwrap();
        assert_eq!(control.sink().markers.len(), 2);
    }

    fn filters_event(json: &str) -> ControlEvent {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_ceiling_keeps_other_filters() {
        let mut control = control();
        let events = feed_events(
            vec![
                viewport(40.0, -4.0, 41.0, -3.0),
                filters_event(
                    r#"{"type": "filters", "criteria": {"open_24h": true, "price_ceilings": {"diesel_a": "abc"}}}"#,
                ),
            ],
            Duration::from_secs(1),
        );
        control.run(loaded(stations()), events).await.unwrap();

        let criteria = control.state().session.criteria();
        assert!(criteria.open_24h);
        assert!(criteria.price_ceilings.is_empty());
        assert_eq!(control.sink().markers.keys().collect::<Vec<_>>(), vec!["2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_comma_decimal_ceiling() {
        let mut control = control();
        let events = feed_events(
            vec![
                viewport(40.0, -4.0, 41.0, -3.0),
                filters_event(r#"{"type": "filters", "criteria": {"price_ceilings": {"diesel_a": "1,40"}}}"#),
            ],
            Duration::from_secs(1),
        );
        control.run(loaded(stations()), events).await.unwrap();

        assert_eq!(
            control.state().session.criteria().price_ceilings.get(&FuelKind::DieselA),
            Some(&1.4)
        );
        assert_eq!(control.sink().markers.keys().collect::<Vec<_>>(), vec!["1"]);
    }

    #[test]
    fn test_filter_update_ceilings() {
        let update: FilterUpdate = serde_json::from_str(
            r#"{"name_prefix": "rep", "price_ceilings": {"gasoline95_e5": 1.5, "diesel_a": "-2", "lpg": ""}}"#,
        )
        .unwrap();
        let criteria = update.into_criteria();

        assert_eq!(criteria.name_prefix.as_deref(), Some("rep"));
        assert_eq!(criteria.price_ceilings.len(), 1);
        assert_eq!(criteria.price_ceilings.get(&FuelKind::Gasoline95E5), Some(&1.5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_and_bad_viewport() {
        let mut control = control();
        let events = feed_events(
            vec![
                viewport(41.0, -3.0, 40.0, -4.0),
                ControlEvent::Shutdown,
                viewport(40.0, -4.0, 41.0, -3.0),
            ],
            Duration::ZERO,
        );
        control.run(loaded(stations()), events).await.unwrap();

        assert!(control.state().viewport.is_none());
        assert!(control.sink().markers.is_empty());
    }

    #[test]
    fn test_event_json() {
        let event: ControlEvent = serde_json::from_str(
            r#"{"type": "viewport", "min_lat": 40.0, "min_lon": -4.0, "max_lat": 41.0, "max_lon": -3.0}"#,
        )
        .unwrap();
        assert_eq!(event, viewport(40.0, -4.0, 41.0, -3.0).with_zoom(14.0));

        let event: ControlEvent =
            serde_json::from_str(r#"{"type": "filters", "criteria": {"open_24h": true}}"#).unwrap();
        assert!(matches!(event, ControlEvent::Filters { criteria } if criteria.open_24h));

        let event: ControlEvent = serde_json::from_str(r#"{"type": "toggle_favorite", "id": "7"}"#).unwrap();
        assert_eq!(event, ControlEvent::ToggleFavorite { id: "7".to_string() });

        assert!(serde_json::from_str::<ControlEvent>(r#"{"type": "zoom"}"#).is_err());
    }

    impl ControlEvent {
        fn with_zoom(self, zoom: f64) -> Self {
            match self {
                ControlEvent::Viewport {
                    min_lat,
                    min_lon,
                    max_lat,
                    max_lon,
                    ..
                } => ControlEvent::Viewport {
                    min_lat,
                    min_lon,
                    max_lat,
                    max_lon,
                    zoom,
                },
                other => other,
            }
        }
    }
}

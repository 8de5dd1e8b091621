pub mod control;
pub mod loader;
pub mod settings;
pub mod sink;
pub mod state;
pub mod storage;

use control::{ControlEvent, ControlLoop};
use geogas_lib::{Favorites, GeoGasError, MapSession};
use settings::Settings;
use sink::JsonLinesSink;
use state::AppState;
use storage::{FileStorage, PersistedFavorites, StorageError};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Feed error: {0}")]
    Feed(#[from] GeoGasError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feed loader stopped before delivering stations")]
    LoaderGone,
}

/// Open the favorites store described by the settings
fn open_favorites(settings: &Settings) -> Result<PersistedFavorites, AppError> {
    if settings.ignore_persisted {
        tracing::info!("Ignoring persisted favorites");
        return Ok(PersistedFavorites::in_memory());
    }
    let backend = FileStorage::new_with_path(settings.favorites_file.clone())?;
    tracing::debug!(path = %backend.path().display(), "Favorites storage");
    Ok(PersistedFavorites::load(Box::new(backend))?)
}

/// Forward control events read from stdin, one JSON object per line
fn spawn_stdin_events(tx: mpsc::Sender<ControlEvent>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match serde_json::from_str::<ControlEvent>(&line) {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!("Ignoring control event {line:?}: {e}"),
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Failed to read control events: {e}");
                    break;
                }
            }
        }
    });
}

/// Run the map driver until the event stream ends
pub async fn run(settings: Settings) -> Result<(), AppError> {
    let load = loader::spawn_feed_load(settings.feed.clone());

    let mut favorites = open_favorites(&settings)?;
    for id in &settings.toggle_favorite {
        let favorite = favorites.toggle(id)?;
        tracing::info!(id = %id, favorite, "Favorite toggled");
    }

    let mut session = MapSession::new(settings.config());
    session.set_criteria(settings.criteria());

    let mut state = AppState::new(session, favorites);
    // Favorites are readable, the sink is open
    state.load.mark_permissions();
    state.load.mark_map_ready();

    let (tx, rx) = mpsc::channel(64);
    if let Some(bbox) = settings.bbox {
        let initial = ControlEvent::Viewport {
            min_lat: bbox.min_lat(),
            min_lon: bbox.min_lon(),
            max_lat: bbox.max_lat(),
            max_lon: bbox.max_lon(),
            zoom: settings.zoom,
        };
        // Capacity is free at this point
        let _ = tx.try_send(initial);
    }
    if settings.events {
        spawn_stdin_events(tx);
    } else {
        drop(tx);
    }

    let sink = JsonLinesSink::new(std::io::stdout().lock());
    let mut control = ControlLoop::new(state, sink);
    control.run(load, rx).await?;

    let (state, _) = control.into_parts();
    tracing::info!(
        markers = state.session.markers().len(),
        favorites = state.favorites.len(),
        "Done"
    );
    Ok(())
}

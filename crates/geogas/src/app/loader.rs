//! Background station feed loading

use super::AppError;
use geogas_lib::{Station, feed};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tokio::sync::oneshot;

/// Result delivered by the feed loader
pub type LoadResult = Result<Vec<Station>, AppError>;

/// Decode the feed at `path` on the blocking pool
///
/// The receiver yields exactly one result. If the task dies before sending,
/// the receiver reports a closed channel which callers treat as a failed load.
pub fn spawn_feed_load(path: PathBuf) -> oneshot::Receiver<LoadResult> {
    let (tx, rx) = oneshot::channel();
    tokio::task::spawn_blocking(move || {
        let result = load_feed(&path);
        match &result {
            Ok(stations) => tracing::info!(path = %path.display(), stations = stations.len(), "Feed loaded"),
            Err(e) => tracing::error!(path = %path.display(), "Feed load failed: {e}"),
        }
        // Receiver gone means the app is shutting down
        let _ = tx.send(result);
    });
    rx
}

fn load_feed(path: &std::path::Path) -> LoadResult {
    let file = File::open(path)?;
    Ok(feed::decode_reader(BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_load_feed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"ListaEESSPrecio": [{{"IDEESS": "1", "Latitud": "40,4", "Longitud (WGS84)": "-3,7"}}]}}"#
        )
        .unwrap();

        let stations = spawn_feed_load(file.path().to_path_buf()).await.unwrap().unwrap();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].id(), Some("1"));
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = spawn_feed_load(dir.path().join("missing.json")).await.unwrap();
        assert!(matches!(result, Err(AppError::Io(_))));
    }

    #[tokio::test]
    async fn test_bad_shape_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"items": []}}"#).unwrap();
        let result = spawn_feed_load(file.path().to_path_buf()).await.unwrap();
        assert!(matches!(result, Err(AppError::Feed(_))));
    }
}

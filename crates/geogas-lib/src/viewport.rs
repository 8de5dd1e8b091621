//! Viewport selection
//!
//! Selection is a linear scan: keep the stations whose coordinates fall
//! inside the visible box, rank them, and truncate to a safety cap so the
//! renderer never receives more markers than it can handle.

use crate::{GeoGasError, Result, ScoredStation, Scorer, Station, utils};
use geo::{BoundingRect, Coord, MultiPoint, Point, Rect};
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default maximum number of stations handed to the renderer
pub const DEFAULT_CAP: usize = 20_000;

/// Geographic bounding box in WGS84 degrees (x = longitude, y = latitude)
///
/// Containment is inclusive on every edge.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BoundingBox {
    rect: Rect<f64>,
}

impl BoundingBox {
    /// Create a bounding box from its corners
    ///
    /// # Errors
    /// Returns `InvalidBoundingBox` if a corner is off the globe or the
    /// minimum exceeds the maximum on either axis.
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Result<Self> {
        if !utils::is_valid_wgs84(min_lat, min_lon) || !utils::is_valid_wgs84(max_lat, max_lon) {
            return Err(GeoGasError::InvalidBoundingBox(format!(
                "corner outside WGS84 range: ({min_lat}, {min_lon}) ({max_lat}, {max_lon})"
            )));
        }
        if min_lat > max_lat || min_lon > max_lon {
            return Err(GeoGasError::InvalidBoundingBox(format!(
                "minimum exceeds maximum: ({min_lat}, {min_lon}) ({max_lat}, {max_lon})"
            )));
        }
        Ok(Self {
            rect: Rect::new(
                Coord { x: min_lon, y: min_lat },
                Coord { x: max_lon, y: max_lat },
            ),
        })
    }

    /// Smallest box covering every point, `None` for no points
    pub fn covering(points: impl IntoIterator<Item = Point<f64>>) -> Option<Self> {
        let multi: MultiPoint<f64> = points.into_iter().collect();
        multi.bounding_rect().map(|rect| Self { rect })
    }

    #[inline]
    pub fn min_lat(&self) -> f64 {
        self.rect.min().y
    }

    #[inline]
    pub fn min_lon(&self) -> f64 {
        self.rect.min().x
    }

    #[inline]
    pub fn max_lat(&self) -> f64 {
        self.rect.max().y
    }

    #[inline]
    pub fn max_lon(&self) -> f64 {
        self.rect.max().x
    }

    /// Center as (lat, lon)
    #[inline]
    pub fn center(&self) -> (f64, f64) {
        let center = self.rect.center();
        (center.y, center.x)
    }

    #[inline]
    pub fn rect(&self) -> Rect<f64> {
        self.rect
    }

    /// Inclusive containment test
    #[inline(always)]
    pub fn contains(&self, point: Point<f64>) -> bool {
        let (min, max) = (self.rect.min(), self.rect.max());
        point.x() >= min.x && point.x() <= max.x && point.y() >= min.y && point.y() <= max.y
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_lat(),
            self.min_lon(),
            self.max_lat(),
            self.max_lon()
        )
    }
}

/// Parse `min_lat,min_lon,max_lat,max_lon`
impl FromStr for BoundingBox {
    type Err = GeoGasError;

    fn from_str(s: &str) -> Result<Self> {
        let values: Vec<f64> = s
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| GeoGasError::InvalidBoundingBox(format!("{s:?}: {e}")))?;

        match values[..] {
            [min_lat, min_lon, max_lat, max_lon] => Self::new(min_lat, min_lon, max_lat, max_lon),
            _ => Err(GeoGasError::InvalidBoundingBox(format!(
                "{s:?}: expected 4 comma-separated values, got {}",
                values.len()
            ))),
        }
    }
}

/// Bounding-box selection with ranking and cap enforcement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportSelector {
    cap: usize,
}

impl Default for ViewportSelector {
    fn default() -> Self {
        Self::new(DEFAULT_CAP)
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl ViewportSelector {
    pub fn new(cap: usize) -> Self {
        Self { cap }
    }

    #[inline]
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Stations with usable coordinates inside `bbox`, in input order
    pub fn in_box<'a>(stations: impl IntoIterator<Item = &'a Station>, bbox: &BoundingBox) -> Vec<&'a Station> {
        stations
            .into_iter()
            .filter(|station| station.position().is_some_and(|p| bbox.contains(p)))
            .collect()
    }

    /// Select, rank and cap the stations inside `bbox`, keeping their scores
    ///
    /// Ranking is by descending score; equal scores keep input order.
    pub fn select_scored<'a, S: Scorer + ?Sized>(
        &self,
        stations: impl IntoIterator<Item = &'a Station>,
        bbox: &BoundingBox,
        scorer: &S,
    ) -> Vec<ScoredStation<'a>> {
        #[cfg(feature = "profiling")]
        profiling::scope!("viewport::select");

        let visible = Self::in_box(stations, bbox);

        let mut scored: Vec<ScoredStation<'a>> = visible
            .par_iter()
            .map(|&station| ScoredStation {
                station,
                score: scorer.score(station),
            })
            .collect();

        // sort_by is stable
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(self.cap);

        tracing::trace!(visible = visible.len(), selected = scored.len(), "Viewport selection");
        scored
    }

    /// Select, rank and cap the stations inside `bbox`
    pub fn select<'a, S: Scorer + ?Sized>(
        &self,
        stations: impl IntoIterator<Item = &'a Station>,
        bbox: &BoundingBox,
        scorer: &S,
    ) -> Vec<&'a Station> {
        self.select_scored(stations, bbox, scorer)
            .into_iter()
            .map(|scored| scored.station)
            .collect()
    }
}

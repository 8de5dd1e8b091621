//! Relevance scoring
//!
//! A station's relevance is a weighted sum of three sub-scores, each in
//! `[0, 1]`: how cheap its common fuels are, how many common fuels it sells,
//! and whether the user marked it as favorite.

use crate::{FavoritesQuery, FuelKind, Station};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Fuels contributing to the price sub-score, with their reference ceiling
const PRICE_REFERENCES: [(FuelKind, f64); 3] = [
    (FuelKind::Gasoline95E5, 2.0),
    (FuelKind::DieselA, 2.0),
    (FuelKind::Lpg, 1.5),
];

/// Fuels counted by the variety sub-score
const VARIETY_FUELS: [FuelKind; 4] = [
    FuelKind::Gasoline95E5,
    FuelKind::Gasoline98E5,
    FuelKind::DieselA,
    FuelKind::Lpg,
];

/// Number of fuels at which the variety sub-score saturates
const VARIETY_SATURATION: f64 = 3.0;

/// Weights of the relevance sub-scores
///
/// Weights are used as given. If they do not sum to 1.0 the total score may
/// leave `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScoreWeights {
    pub price: f64,
    pub variety: f64,
    pub favorite: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            price: 0.2,
            variety: 0.4,
            favorite: 0.4,
        }
    }
}

/// Anything able to rank a station
///
/// Scoring runs on the rayon pool, hence the `Sync` bound.
pub trait Scorer: Sync {
    fn score(&self, station: &Station) -> f64;
}

impl<S: Fn(&Station) -> f64 + Sync> Scorer for S {
    #[inline]
    fn score(&self, station: &Station) -> f64 {
        self(station)
    }
}

/// A station paired with its relevance score
#[derive(Debug, Clone, Copy)]
pub struct ScoredStation<'a> {
    pub station: &'a Station,
    pub score: f64,
}

/// Default scorer combining price, fuel variety and favorite status
pub struct RelevanceScorer<'f, F: ?Sized> {
    weights: ScoreWeights,
    favorites: &'f F,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<'f, F: FavoritesQuery + ?Sized> RelevanceScorer<'f, F> {
    pub fn new(weights: ScoreWeights, favorites: &'f F) -> Self {
        Self { weights, favorites }
    }

    /// Scorer with the default weights
    pub fn with_defaults(favorites: &'f F) -> Self {
        Self::new(ScoreWeights::default(), favorites)
    }

    #[inline]
    pub fn weights(&self) -> ScoreWeights {
        self.weights
    }

    /// Average normalized saving over the reference fuels the station prices
    ///
    /// Unparsable and negative prices are skipped. A station with none of the
    /// reference fuels scores 0.
    pub fn price_score(station: &Station) -> f64 {
        let (sum, count) = PRICE_REFERENCES
            .iter()
            .filter_map(|(kind, ceiling)| {
                let price = station.price(*kind).filter(|p| *p >= 0.0)?;
                Some((ceiling - price).max(0.0) / ceiling)
            })
            .fold((0.0, 0usize), |(sum, count), s| (sum + s, count + 1));

        if count == 0 { 0.0 } else { sum / count as f64 }
    }

    /// Number of common fuels sold, saturating at three
    pub fn variety_score(station: &Station) -> f64 {
        let count = VARIETY_FUELS
            .iter()
            .filter(|kind| station.has_fuel(**kind))
            .count();
        (count as f64 / VARIETY_SATURATION).min(1.0)
    }

    pub fn favorite_score(&self, station: &Station) -> f64 {
        match station.id() {
            Some(id) if self.favorites.contains(id) => 1.0,
            _ => 0.0,
        }
    }
}

impl<F: FavoritesQuery + Sync + ?Sized> Scorer for RelevanceScorer<'_, F> {
    fn score(&self, station: &Station) -> f64 {
        self.weights.price * Self::price_score(station)
            + self.weights.variety * Self::variety_score(station)
            + self.weights.favorite * self.favorite_score(station)
    }
}

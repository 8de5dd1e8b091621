//! User filter criteria
//!
//! [`FilterCriteria`] is a plain value describing what the user asked for;
//! [`FilterEngine`] applies it to a station slice. Every active criterion is
//! combined with AND, so adding criteria can only shrink the result.

use crate::{FavoritesQuery, FuelKind, GeoGasError, Result, Station, utils};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Criteria chosen by the user
///
/// Empty strings in the text criteria are treated as "not set".
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FilterCriteria {
    /// Exact, case-sensitive province
    pub province: Option<String>,
    /// Exact, case-sensitive municipality
    pub municipality: Option<String>,
    /// Case-insensitive prefix of the station name
    pub name_prefix: Option<String>,
    /// Fuels the station must sell
    pub required_fuels: BTreeSet<FuelKind>,
    /// Only stations with `"24H"` schedule
    pub open_24h: bool,
    /// Only stations marked as favorite
    pub favorites_only: bool,
    /// Maximum accepted price per fuel kind
    pub price_ceilings: BTreeMap<FuelKind, f64>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_province(mut self, province: impl Into<String>) -> Self {
        self.province = Some(province.into());
        self
    }

    pub fn with_municipality(mut self, municipality: impl Into<String>) -> Self {
        self.municipality = Some(municipality.into());
        self
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = Some(prefix.into());
        self
    }

    pub fn require_fuel(mut self, kind: FuelKind) -> Self {
        self.required_fuels.insert(kind);
        self
    }

    pub fn open_24h(mut self) -> Self {
        self.open_24h = true;
        self
    }

    pub fn favorites_only(mut self) -> Self {
        self.favorites_only = true;
        self
    }

    pub fn with_price_ceiling(mut self, kind: FuelKind, ceiling: f64) -> Self {
        self.price_ceilings.insert(kind, ceiling);
        self
    }

    /// Check whether at least one criterion is active
    pub fn has_active_filters(&self) -> bool {
        active_text(&self.province).is_some()
            || active_text(&self.municipality).is_some()
            || active_text(&self.name_prefix).is_some()
            || !self.required_fuels.is_empty()
            || self.open_24h
            || self.favorites_only
            || !self.price_ceilings.is_empty()
    }

    /// Reset every criterion
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Check whether a single station passes every active criterion
    pub fn matches<F: FavoritesQuery + ?Sized>(&self, station: &Station, favorites: &F) -> bool {
        self.matches_location(station)
            && self.matches_name(station)
            && self.matches_fuels(station)
            && self.matches_services(station, favorites)
            && self.matches_prices(station)
    }

    fn matches_location(&self, station: &Station) -> bool {
        if let Some(province) = active_text(&self.province)
            && station.province.as_deref() != Some(province)
        {
            return false;
        }
        if let Some(municipality) = active_text(&self.municipality)
            && station.municipality.as_deref() != Some(municipality)
        {
            return false;
        }
        true
    }

    fn matches_name(&self, station: &Station) -> bool {
        let Some(prefix) = active_text(&self.name_prefix) else {
            return true;
        };
        station
            .name
            .as_deref()
            .is_some_and(|name| name.to_lowercase().starts_with(&prefix.to_lowercase()))
    }

    /// Placeholders such as `"n/d"` or `"-"` do not count as selling the fuel
    fn matches_fuels(&self, station: &Station) -> bool {
        self.required_fuels.iter().all(|kind| station.price(*kind).is_some())
    }

    fn matches_services<F: FavoritesQuery + ?Sized>(&self, station: &Station, favorites: &F) -> bool {
        if self.open_24h && !station.is_open_24h() {
            return false;
        }
        if self.favorites_only && !station.id().is_some_and(|id| favorites.contains(id)) {
            return false;
        }
        true
    }

    /// Fails closed: a ceiling on a fuel whose price is absent or unparsable excludes the station
    fn matches_prices(&self, station: &Station) -> bool {
        self.price_ceilings
            .iter()
            .all(|(kind, ceiling)| station.price(*kind).is_some_and(|price| price <= *ceiling))
    }
}

/// Treat `Some("")` like `None`
#[inline]
fn active_text(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Stateless application of [`FilterCriteria`] to a station collection
pub struct FilterEngine;

impl FilterEngine {
    /// Keep the stations that pass every active criterion, preserving input order
    pub fn apply<'a, F: FavoritesQuery + ?Sized>(
        stations: impl IntoIterator<Item = &'a Station>,
        criteria: &FilterCriteria,
        favorites: &F,
    ) -> Vec<&'a Station> {
        #[cfg(feature = "profiling")]
        profiling::scope!("filter::apply");

        stations
            .into_iter()
            .filter(|station| criteria.matches(station, favorites))
            .collect()
    }
}

/// Parse a price ceiling typed by the user
///
/// Empty input means "no ceiling". Both comma and dot separators are accepted.
/// A non-numeric or negative value is a user-input error; callers report it
/// and carry on without a ceiling.
pub fn parse_price_ceiling(input: &str) -> Result<Option<f64>> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    match utils::parse_decimal(input) {
        Some(value) if value >= 0.0 => Ok(Some(value)),
        _ => Err(GeoGasError::InvalidPriceInput(input.to_string())),
    }
}

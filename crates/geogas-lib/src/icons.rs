//! Icon density policy
//!
//! The more stations are on screen, the smaller their icons get. The zoom
//! level shifts the thresholds: close-up views switch to smaller icons earlier
//! because each icon covers a larger share of the visible area.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Icon size tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum IconTier {
    Normal,
    Small,
    Tiny,
}

impl IconTier {
    /// Human-readable size description
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Tiny => "tiny (16dp)",
            Self::Small => "small (24dp)",
            Self::Normal => "normal (48dp)",
        }
    }
}

impl fmt::Display for IconTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Icon choice for a single marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MarkerIcon {
    pub tier: IconTier,
    pub favorite: bool,
}

/// Station counts above which icons shrink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DensityThresholds {
    /// Count above which icons become `Small`
    pub small: usize,
    /// Count above which icons become `Tiny`
    pub tiny: usize,
}

/// Chooses the icon tier from the number of stations in view and the zoom
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IconDensityPolicy {
    /// Zoom above which `close` thresholds apply (exclusive)
    pub close_zoom: f64,
    pub close: DensityThresholds,
    pub far: DensityThresholds,
}

impl Default for IconDensityPolicy {
    fn default() -> Self {
        Self {
            close_zoom: 14.0,
            close: DensityThresholds { small: 15, tiny: 40 },
            far: DensityThresholds { small: 25, tiny: 80 },
        }
    }
}

impl IconDensityPolicy {
    /// Thresholds in effect at `zoom`
    #[inline]
    pub fn thresholds(&self, zoom: f64) -> DensityThresholds {
        if zoom > self.close_zoom { self.close } else { self.far }
    }

    /// Icon tier for `count_in_view` stations at `zoom`
    pub fn tier(&self, count_in_view: usize, zoom: f64) -> IconTier {
        let thresholds = self.thresholds(zoom);
        if count_in_view > thresholds.tiny {
            IconTier::Tiny
        } else if count_in_view > thresholds.small {
            IconTier::Small
        } else {
            IconTier::Normal
        }
    }

    /// Full icon choice, carrying the favorite variant
    #[inline]
    pub fn icon(&self, count_in_view: usize, zoom: f64, favorite: bool) -> MarkerIcon {
        MarkerIcon {
            tier: self.tier(count_in_view, zoom),
            favorite,
        }
    }
}

/// Maps an icon choice to a renderer-specific handle
pub trait IconResolver {
    type Handle;

    fn resolve(&self, icon: MarkerIcon) -> Self::Handle;
}

/// Resolves icons to drawable resource names (`ic_star_small`, `ic_gas_station_tiny`, ...)
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceNames;

impl IconResolver for ResourceNames {
    type Handle = &'static str;

    fn resolve(&self, icon: MarkerIcon) -> &'static str {
        match (icon.favorite, icon.tier) {
            (true, IconTier::Normal) => "ic_star",
            (true, IconTier::Small) => "ic_star_small",
            (true, IconTier::Tiny) => "ic_star_tiny",
            (false, IconTier::Normal) => "ic_gas_station",
            (false, IconTier::Small) => "ic_gas_station_small",
            (false, IconTier::Tiny) => "ic_gas_station_tiny",
        }
    }
}

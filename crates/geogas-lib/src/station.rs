//! Station model
//!
//! This module provides the `Station` struct, a lightly normalized view of a
//! feed record. Values are kept as the raw strings the feed delivered; numeric
//! parsing happens lazily in the accessors so that a malformed field only
//! affects the stage that needs it.

use crate::{GeoGasError, utils};
use geo::Point;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Schedule value that denotes round-the-clock service
pub const OPEN_24H: &str = "24H";

/// Fuel kinds published by the station feed
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FuelKind {
    Gasoline95E5,
    Gasoline95E10,
    Gasoline98E5,
    Gasoline98E10,
    /// Road diesel ("Gasóleo A")
    DieselA,
    /// Agricultural diesel ("Gasóleo B")
    DieselB,
    /// Heating diesel ("Gasóleo C")
    DieselC,
    DieselPremium,
    /// Liquefied petroleum gas
    Lpg,
    /// Compressed natural gas
    Cng,
    /// Liquefied natural gas
    Lng,
    Hydrogen,
    Biodiesel,
    Bioethanol,
}

impl FuelKind {
    pub const ALL: [FuelKind; 14] = [
        Self::Gasoline95E5,
        Self::Gasoline95E10,
        Self::Gasoline98E5,
        Self::Gasoline98E10,
        Self::DieselA,
        Self::DieselB,
        Self::DieselC,
        Self::DieselPremium,
        Self::Lpg,
        Self::Cng,
        Self::Lng,
        Self::Hydrogen,
        Self::Biodiesel,
        Self::Bioethanol,
    ];

    /// Stable machine name (`gasoline95_e5`, `diesel_a`, ...)
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gasoline95E5 => "gasoline95_e5",
            Self::Gasoline95E10 => "gasoline95_e10",
            Self::Gasoline98E5 => "gasoline98_e5",
            Self::Gasoline98E10 => "gasoline98_e10",
            Self::DieselA => "diesel_a",
            Self::DieselB => "diesel_b",
            Self::DieselC => "diesel_c",
            Self::DieselPremium => "diesel_premium",
            Self::Lpg => "lpg",
            Self::Cng => "cng",
            Self::Lng => "lng",
            Self::Hydrogen => "hydrogen",
            Self::Biodiesel => "biodiesel",
            Self::Bioethanol => "bioethanol",
        }
    }

    /// Human-readable label used in marker snippets and detail views
    pub fn label(&self) -> &'static str {
        match self {
            Self::Gasoline95E5 => "Gasolina 95 E5",
            Self::Gasoline95E10 => "Gasolina 95 E10",
            Self::Gasoline98E5 => "Gasolina 98 E5",
            Self::Gasoline98E10 => "Gasolina 98 E10",
            Self::DieselA => "Gasóleo A",
            Self::DieselB => "Gasóleo B",
            Self::DieselC => "Gasóleo C",
            Self::DieselPremium => "Gasóleo Premium",
            Self::Lpg => "GLP",
            Self::Cng => "GNC",
            Self::Lng => "GNL",
            Self::Hydrogen => "Hidrógeno",
            Self::Biodiesel => "Biodiésel",
            Self::Bioethanol => "Bioetanol",
        }
    }

    /// Name of the price field carrying this fuel in the station feed
    pub fn feed_field(&self) -> &'static str {
        match self {
            Self::Gasoline95E5 => "Precio Gasolina 95 E5",
            Self::Gasoline95E10 => "Precio Gasolina 95 E10",
            Self::Gasoline98E5 => "Precio Gasolina 98 E5",
            Self::Gasoline98E10 => "Precio Gasolina 98 E10",
            Self::DieselA => "Precio Gasoleo A",
            Self::DieselB => "Precio Gasoleo B",
            Self::DieselC => "Precio Gasoleo C",
            Self::DieselPremium => "Precio Gasoleo Premium",
            Self::Lpg => "Precio Gases licuados del petróleo",
            Self::Cng => "Precio Gas Natural Comprimido",
            Self::Lng => "Precio Gas Natural Licuado",
            Self::Hydrogen => "Precio Hidrogeno",
            Self::Biodiesel => "Precio Biodiesel",
            Self::Bioethanol => "Precio Bioetanol",
        }
    }
}

impl fmt::Display for FuelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FuelKind {
    type Err = GeoGasError;

    fn from_str(s: &str) -> Result<Self, GeoGasError> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| GeoGasError::UnknownFuelKind(s.to_string()))
    }
}

/// A fuel station as delivered by the feed
///
/// All descriptive fields are optional because the upstream data is sparse.
/// Prices are stored as raw strings; a blank price is never stored so that
/// "absent" and "empty" collapse into the same state.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Station {
    /// Externally assigned identifier (absent for malformed records)
    pub id: Option<String>,
    /// Brand name shown on the marker
    pub name: Option<String>,
    pub postal_code: Option<String>,
    pub address: Option<String>,
    pub locality: Option<String>,
    pub municipality: Option<String>,
    pub province: Option<String>,
    /// Raw latitude, comma or dot decimal separator
    pub latitude: Option<String>,
    /// Raw longitude, comma or dot decimal separator
    pub longitude: Option<String>,
    /// Free-text opening hours; `"24H"` means round-the-clock
    pub schedule: Option<String>,
    /// "P" (public) or "R" (restricted)
    pub sale_type: Option<String>,
    /// "I" (integrated) or "C" (competition)
    pub margin: Option<String>,
    /// Price reporting channel ("dm" or "OM")
    pub remission: Option<String>,
    /// Raw prices by fuel kind, only non-blank values
    prices: BTreeMap<FuelKind, String>,
}

impl Station {
    /// Create a station with the given identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Create a station without identifier (malformed record)
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_location(mut self, province: impl Into<String>, municipality: impl Into<String>) -> Self {
        self.province = Some(province.into());
        self.municipality = Some(municipality.into());
        self
    }

    pub fn with_coordinates(mut self, latitude: impl Into<String>, longitude: impl Into<String>) -> Self {
        self.latitude = Some(latitude.into());
        self.longitude = Some(longitude.into());
        self
    }

    pub fn with_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    pub fn with_price(mut self, kind: FuelKind, raw: impl Into<String>) -> Self {
        self.set_price(kind, Some(raw.into()));
        self
    }

    /// Set or clear the raw price of a fuel kind; blank values clear it
    pub fn set_price(&mut self, kind: FuelKind, raw: Option<String>) {
        match raw {
            Some(raw) if !raw.trim().is_empty() => {
                self.prices.insert(kind, raw);
            }
            _ => {
                self.prices.remove(&kind);
            }
        }
    }

    /// Get the identifier, if the record carried one
    #[inline]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Get the raw price string of a fuel kind (never blank)
    #[inline]
    pub fn raw_price(&self, kind: FuelKind) -> Option<&str> {
        self.prices.get(&kind).map(String::as_str)
    }

    /// Check whether the station sells a fuel kind
    #[inline]
    pub fn has_fuel(&self, kind: FuelKind) -> bool {
        self.prices.contains_key(&kind)
    }

    /// Get the parsed price of a fuel kind
    ///
    /// Returns `None` both when the fuel is not sold and when the stored
    /// value is unparsable.
    #[inline]
    pub fn price(&self, kind: FuelKind) -> Option<f64> {
        self.raw_price(kind).and_then(utils::parse_decimal)
    }

    /// Iterate over all fuels with a price, in `FuelKind` order
    pub fn prices(&self) -> impl Iterator<Item = (FuelKind, &str)> {
        self.prices.iter().map(|(kind, raw)| (*kind, raw.as_str()))
    }

    /// Get the parsed position (x = longitude, y = latitude)
    ///
    /// Returns `None` if the coordinates are missing, malformed or off the globe.
    #[inline]
    pub fn position(&self) -> Option<Point<f64>> {
        utils::parse_position(self.latitude.as_deref(), self.longitude.as_deref())
    }

    /// Check whether the station advertises round-the-clock service
    #[inline]
    pub fn is_open_24h(&self) -> bool {
        self.schedule.as_deref() == Some(OPEN_24H)
    }

    /// Informational fields for a detail view, skipping absent values
    pub fn details(&self) -> Vec<(&'static str, &str)> {
        [
            ("Dirección", &self.address),
            ("C.P.", &self.postal_code),
            ("Localidad", &self.locality),
            ("Municipio", &self.municipality),
            ("Provincia", &self.province),
            ("Horario", &self.schedule),
            ("Tipo Venta", &self.sale_type),
            ("Margen", &self.margin),
            ("Remisión", &self.remission),
        ]
        .into_iter()
        .filter_map(|(label, value)| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(|v| (label, v))
        })
        .collect()
    }
}

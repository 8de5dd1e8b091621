use super::control::apply_price_ceiling;
use clap::Parser;
use geogas_lib::{BoundingBox, Config, DEFAULT_CAP, FilterCriteria, FuelKind, ScoreWeights};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// GeoGas - Fuel station map driver: filters, ranks and reconciles station markers
pub struct Settings {
    /// Station feed to load on startup (JSON array or wrapped feed object)
    #[clap(short, long, value_name = "FILE")]
    pub feed: PathBuf,

    /// Initial viewport as "min_lat,min_lon,max_lat,max_lon"
    #[clap(long, value_name = "BOX", allow_hyphen_values = true)]
    pub bbox: Option<BoundingBox>,

    /// Initial zoom level
    #[clap(short, long, default_value = "14.0")]
    pub zoom: f64,

    /// Only stations in this province (exact, case-sensitive)
    #[clap(long)]
    pub province: Option<String>,

    /// Only stations in this municipality (exact, case-sensitive)
    #[clap(long)]
    pub municipality: Option<String>,

    /// Only stations whose name starts with this prefix
    #[clap(long)]
    pub name: Option<String>,

    /// Required fuels (repeatable), e.g. gasoline95_e5, diesel_a, lpg
    #[clap(long = "fuel", value_name = "FUEL")]
    pub fuels: Vec<FuelKind>,

    /// Only stations open 24 hours
    #[clap(long, default_value = "false")]
    pub open_24h: bool,

    /// Only favorite stations
    #[clap(long, default_value = "false")]
    pub favorites_only: bool,

    /// Maximum Gasolina 95 E5 price, comma or dot decimal
    #[clap(long, value_name = "PRICE")]
    pub max_price_95: Option<String>,

    /// Maximum Gasóleo A price, comma or dot decimal
    #[clap(long, value_name = "PRICE")]
    pub max_price_diesel: Option<String>,

    /// Weight of the price sub-score
    #[clap(long, default_value = "0.2")]
    pub price_weight: f64,

    /// Weight of the fuel variety sub-score
    #[clap(long, default_value = "0.4")]
    pub variety_weight: f64,

    /// Weight of the favorite sub-score
    #[clap(long, default_value = "0.4")]
    pub favorite_weight: f64,

    /// Maximum number of markers rendered per viewport
    #[clap(long, default_value_t = DEFAULT_CAP)]
    pub cap: usize,

    /// Quiescence delay before recomputing after viewport changes (ms)
    #[clap(long, default_value = "300")]
    pub debounce_ms: u64,

    /// File where favorites are persisted (defaults to the user config dir)
    #[clap(long, value_name = "FILE")]
    pub favorites_file: Option<PathBuf>,

    /// Ignore previously persisted state and start fresh
    #[clap(long, default_value = "false")]
    pub ignore_persisted: bool,

    /// Toggle the favorite state of these station ids before starting
    #[clap(long, value_name = "ID")]
    pub toggle_favorite: Vec<String>,

    /// Read control events (JSON lines) from stdin until EOF
    #[clap(long, default_value = "false")]
    pub events: bool,
}

impl Settings {
    /// Parse settings from the command line, exiting on invalid arguments
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    /// Session configuration described by these settings
    pub fn config(&self) -> Config {
        Config {
            weights: ScoreWeights {
                price: self.price_weight,
                variety: self.variety_weight,
                favorite: self.favorite_weight,
            },
            cap: self.cap,
            debounce: Duration::from_millis(self.debounce_ms),
            ..Config::default()
        }
    }

    /// Initial filter criteria
    ///
    /// Unparsable price ceilings are reported and left unset.
    pub fn criteria(&self) -> FilterCriteria {
        let mut criteria = FilterCriteria::new();
        if let Some(province) = &self.province {
            criteria = criteria.with_province(province.as_str());
        }
        if let Some(municipality) = &self.municipality {
            criteria = criteria.with_municipality(municipality.as_str());
        }
        if let Some(name) = &self.name {
            criteria = criteria.with_name_prefix(name.as_str());
        }
        for &fuel in &self.fuels {
            criteria = criteria.require_fuel(fuel);
        }
        if self.open_24h {
            criteria = criteria.open_24h();
        }
        if self.favorites_only {
            criteria = criteria.favorites_only();
        }

        let ceilings = [
            (FuelKind::Gasoline95E5, &self.max_price_95),
            (FuelKind::DieselA, &self.max_price_diesel),
        ];
        for (kind, input) in ceilings {
            if let Some(input) = input {
                criteria = apply_price_ceiling(criteria, kind, input);
            }
        }
        criteria
    }
}

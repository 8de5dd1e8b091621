//! Station feed decoding
//!
//! The upstream feed is either a bare JSON array of station records or an
//! object wrapping that array under one of a few well-known field names.
//! Records are decoded one by one; a record that does not fit is skipped so a
//! single bad entry never loses the whole feed.

use crate::{FuelKind, GeoGasError, Result, Station};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::io::Read;

/// Object fields that may hold the station array, in lookup order
pub const ARRAY_FIELDS: [&str; 6] = [
    "ListaEESSPrecio",
    "listaEESSPrecio",
    "data",
    "result",
    "estaciones",
    "gasolineras",
];

/// A station record exactly as published by the feed
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StationRecord {
    #[serde(rename = "IDEESS", default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(rename = "Rótulo", default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(rename = "C.P.", default, deserialize_with = "lenient_string")]
    pub postal_code: Option<String>,
    #[serde(rename = "Dirección", default, deserialize_with = "lenient_string")]
    pub address: Option<String>,
    #[serde(rename = "Localidad", default, deserialize_with = "lenient_string")]
    pub locality: Option<String>,
    #[serde(rename = "Municipio", default, deserialize_with = "lenient_string")]
    pub municipality: Option<String>,
    #[serde(rename = "Provincia", default, deserialize_with = "lenient_string")]
    pub province: Option<String>,
    #[serde(rename = "Latitud", default, deserialize_with = "lenient_string")]
    pub latitude: Option<String>,
    #[serde(rename = "Longitud (WGS84)", default, deserialize_with = "lenient_string")]
    pub longitude: Option<String>,
    #[serde(rename = "Horario", default, deserialize_with = "lenient_string")]
    pub schedule: Option<String>,
    #[serde(rename = "Tipo Venta", default, deserialize_with = "lenient_string")]
    pub sale_type: Option<String>,
    #[serde(rename = "Margen", default, deserialize_with = "lenient_string")]
    pub margin: Option<String>,
    #[serde(rename = "Remisión", default, deserialize_with = "lenient_string")]
    pub remission: Option<String>,
    /// Every remaining field, prices included
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl From<StationRecord> for Station {
    fn from(mut record: StationRecord) -> Self {
        let mut station = Station::default();
        station.id = record.id;
        station.name = record.name;
        station.postal_code = record.postal_code;
        station.address = record.address;
        station.locality = record.locality;
        station.municipality = record.municipality;
        station.province = record.province;
        station.latitude = record.latitude;
        station.longitude = record.longitude;
        station.schedule = record.schedule;
        station.sale_type = record.sale_type;
        station.margin = record.margin;
        station.remission = record.remission;

        for kind in FuelKind::ALL {
            let raw = record.extra.remove(kind.feed_field()).and_then(value_to_string);
            station.set_price(kind, raw);
        }
        station
    }
}

/// Accept strings, numbers and booleans; anything else becomes `None`
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(value_to_string))
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Locate the station array inside a decoded feed document
///
/// # Errors
/// Returns `FeedShape` if the document is neither an array nor an object
/// holding an array under one of [`ARRAY_FIELDS`].
pub fn station_array(document: Value) -> Result<Vec<Value>> {
    match document {
        Value::Array(records) => Ok(records),
        Value::Object(mut object) => ARRAY_FIELDS
            .iter()
            .find_map(|field| match object.remove(*field) {
                Some(Value::Array(records)) => Some(records),
                _ => None,
            })
            .ok_or_else(|| {
                GeoGasError::FeedShape(format!(
                    "object without station array (expected one of {})",
                    ARRAY_FIELDS.join(", ")
                ))
            }),
        other => Err(GeoGasError::FeedShape(format!(
            "expected array or object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Decode station records, skipping those that are not JSON objects
pub fn decode_records(records: Vec<Value>) -> Vec<Station> {
    let total = records.len();
    let stations: Vec<Station> = records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match serde_json::from_value::<StationRecord>(record) {
            Ok(record) => Some(Station::from(record)),
            Err(e) => {
                tracing::debug!(index, error = %e, "Skipping malformed station record");
                None
            }
        })
        .collect();

    let skipped = total - stations.len();
    if skipped > 0 {
        tracing::warn!(skipped, total, "Some station records could not be decoded");
    }
    stations
}

/// Decode a feed document from a string
pub fn decode_str(text: &str) -> Result<Vec<Station>> {
    #[cfg(feature = "profiling")]
    profiling::scope!("feed::decode");

    let document: Value = serde_json::from_str(text)?;
    Ok(decode_records(station_array(document)?))
}

/// Decode a feed document from a reader
pub fn decode_reader<R: Read>(reader: R) -> Result<Vec<Station>> {
    #[cfg(feature = "profiling")]
    profiling::scope!("feed::decode");

    let document: Value = serde_json::from_reader(reader)?;
    Ok(decode_records(station_array(document)?))
}

//! GeoGas - Application Library
//!
//! Headless map driver built on `geogas-lib`: loads a station feed in the
//! background, reads viewport and filter events, and writes marker operations
//! as JSON lines.

pub mod app;
pub mod logging;

pub use app::settings::Settings;
pub use app::{AppError, run};

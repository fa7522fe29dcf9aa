//! A small Rust client for the OpenET evapotranspiration API.
//!
//! Every operation is described by a static entry in the [`catalog`]: its
//! endpoint, parameters, wire encoding and output shape. A call builds the
//! wire request from that entry, sends it exactly once, and normalizes the
//! response into canonical rows, a quota record, or a result URL.
//!
//! ## Quick start
//! - Configure authentication via environment variables (`OPENET_API_URL`, `OPENET_API_KEY`) or a
//!   `.openetrc` file (supported in the current directory and in your home directory).
//! - Call one of the typed operations, e.g. [`Client::fields_timeseries`].
//!
//! ```no_run
//! use anyhow::Result;
//! use chrono::NaiveDate;
//! use openet::{Client, FieldsTimeseriesParams, Units};
//!
//! fn main() -> Result<()> {
//!     let client = Client::from_env()?;
//!     let params = FieldsTimeseriesParams::new(
//!         ["06032233"],
//!         NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
//!         NaiveDate::from_ymd_opt(2021, 12, 31).unwrap(),
//!     )
//!     .with_units(Units::Inches);
//!
//!     let series = client.fields_timeseries(params)?;
//!     series.write_csv(std::io::stdout())?;
//!     Ok(())
//! }
//! ```
//!
//! For full usage and configuration details, see the crate README.

#![forbid(unsafe_code)]

pub mod catalog;
mod client;
mod config;
mod download;
mod error;
mod normalize;
mod params;
mod quota;
mod request;
mod timeseries;
mod transport;
mod util;

pub use catalog::{ApiVersion, CATALOG, OperationDescriptor, OperationId};
pub use client::{Client, ClientConfig};
pub use error::{Error, ErrorKind, ErrorRecord, Result, TransportError, TransportErrorKind, ValidationError};
pub use normalize::{Normalized, normalize};
pub use params::{
    FieldsTimeseriesParams, FileFormat, Interval, IntoParams, MultipolygonTimeseriesParams,
    ParamValue, PolygonTimeseriesParams, Reducer, ReferenceEt, RequestParameters, Units,
};
pub use quota::{NONE_SENTINEL, QuotaRecord, QuotaValue};
pub use request::{Prepared, WireRequest, build, coordinate_pairs, prepare};
pub use timeseries::{CanonicalRow, Column, LongRecord, TimeSeries, pivot_wide};
pub use transport::{Fetched, HttpTransport, Progress, RawResponse, Transport, TransportConfig};

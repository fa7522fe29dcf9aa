//! Caller-facing parameters.
//!
//! Each operation has a typed struct that lowers into the loosely-typed
//! [`RequestParameters`] map the request builder validates against the catalog.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;

use crate::catalog::ApiVersion;

/// One parameter value as handed to the request builder.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    Number(f64),
    Bool(bool),
    List(Vec<String>),
    Coords(Vec<f64>),
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Text(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(v: Vec<String>) -> Self {
        ParamValue::List(v)
    }
}

impl From<&[&str]> for ParamValue {
    fn from(v: &[&str]) -> Self {
        ParamValue::List(v.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(v: Vec<f64>) -> Self {
        ParamValue::Coords(v)
    }
}

impl From<NaiveDate> for ParamValue {
    fn from(v: NaiveDate) -> Self {
        ParamValue::Text(v.format("%Y-%m-%d").to_string())
    }
}

/// Parameter name to value, as supplied for one call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParameters {
    values: BTreeMap<String, ParamValue>,
}

impl RequestParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<ParamValue>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ParamValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Text values of a list parameter; a scalar text parameter yields one entry.
    pub fn texts(&self, name: &str) -> Vec<&str> {
        match self.values.get(name) {
            Some(ParamValue::List(items)) => items.iter().map(|s| s.as_str()).collect(),
            Some(ParamValue::Text(s)) => vec![s.as_str()],
            _ => Vec::new(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Lowering of a typed parameter struct into the wire-agnostic map.
pub trait IntoParams {
    fn into_params(self) -> RequestParameters;
}

impl IntoParams for RequestParameters {
    fn into_params(self) -> RequestParameters {
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Units {
    #[default]
    Millimeters,
    Inches,
}

impl Units {
    /// Code used on the wire and in the `units` column.
    pub fn code(&self) -> &'static str {
        match self {
            Units::Millimeters => "mm",
            Units::Inches => "in",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Units::Millimeters => "millimeters",
            Units::Inches => "inches",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_lowercase().as_str() {
            "mm" | "millimeters" => Some(Units::Millimeters),
            "in" | "inches" => Some(Units::Inches),
            _ => None,
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interval {
    Daily,
    #[default]
    Monthly,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Daily => "daily",
            Interval::Monthly => "monthly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reducer {
    #[default]
    Mean,
    Median,
    Min,
    Max,
    Sum,
}

impl Reducer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reducer::Mean => "mean",
            Reducer::Median => "median",
            Reducer::Min => "min",
            Reducer::Max => "max",
            Reducer::Sum => "sum",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReferenceEt {
    #[default]
    GridMet,
    Cimis,
}

impl ReferenceEt {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceEt::GridMet => "gridMET",
            ReferenceEt::Cimis => "CIMIS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFormat {
    #[default]
    Json,
    Csv,
}

impl FileFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Json => "JSON",
            FileFormat::Csv => "CSV",
        }
    }
}

/// Field-level time series from the OpenET geodatabase.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldsTimeseriesParams {
    pub field_ids: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub model: String,
    pub variables: Vec<String>,
    pub interval: Interval,
    pub units: Units,
    pub file_format: FileFormat,
}

impl FieldsTimeseriesParams {
    pub fn new<I, S>(field_ids: I, start_date: NaiveDate, end_date: NaiveDate) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field_ids: field_ids.into_iter().map(Into::into).collect(),
            start_date,
            end_date,
            model: "Ensemble".to_string(),
            variables: vec!["ET".to_string()],
            interval: Interval::default(),
            units: Units::default(),
            file_format: FileFormat::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_variables<I, S>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variables = variables.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_units(mut self, units: Units) -> Self {
        self.units = units;
        self
    }

    pub fn with_file_format(mut self, file_format: FileFormat) -> Self {
        self.file_format = file_format;
        self
    }
}

impl IntoParams for FieldsTimeseriesParams {
    fn into_params(self) -> RequestParameters {
        RequestParameters::new()
            .with("field_ids", self.field_ids)
            .with("start_date", self.start_date)
            .with("end_date", self.end_date)
            .with("model", self.model)
            .with("variables", self.variables)
            .with("interval", self.interval.as_str())
            .with("units", self.units.code())
            .with("file_format", self.file_format.as_str())
    }
}

/// Raster time series reduced over a single polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonTimeseriesParams {
    /// Flat `[lon, lat, lon, lat, ...]` list; at least three vertices.
    pub geometry: Vec<f64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub model: String,
    pub variable: String,
    pub reference_et: ReferenceEt,
    pub units: Units,
    pub reducer: Reducer,
    pub interval: Interval,
}

impl PolygonTimeseriesParams {
    pub fn new(geometry: Vec<f64>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            geometry,
            start_date,
            end_date,
            model: "Ensemble".to_string(),
            variable: "ET".to_string(),
            reference_et: ReferenceEt::default(),
            units: Units::default(),
            reducer: Reducer::default(),
            interval: Interval::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = variable.into();
        self
    }

    pub fn with_reference_et(mut self, reference_et: ReferenceEt) -> Self {
        self.reference_et = reference_et;
        self
    }

    pub fn with_units(mut self, units: Units) -> Self {
        self.units = units;
        self
    }

    pub fn with_reducer(mut self, reducer: Reducer) -> Self {
        self.reducer = reducer;
        self
    }

    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = interval;
        self
    }
}

impl IntoParams for PolygonTimeseriesParams {
    fn into_params(self) -> RequestParameters {
        RequestParameters::new()
            .with("geometry", self.geometry)
            .with("start_date", self.start_date)
            .with("end_date", self.end_date)
            .with("model", self.model)
            .with("variable", self.variable)
            .with("reference_et", self.reference_et.as_str())
            .with("units", self.units.code())
            .with("reducer", self.reducer.as_str())
            .with("interval", self.interval.as_str())
    }
}

/// Raster time series for every feature of an Earth Engine asset.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipolygonTimeseriesParams {
    pub asset_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub model: String,
    pub variables: Vec<String>,
    /// Asset properties copied into the output file.
    pub attributes: Vec<String>,
    pub reducer: Reducer,
    pub reference_et: ReferenceEt,
    pub units: Units,
    pub interval: Interval,
    /// Only sent by the v1 encoding.
    pub provisional: bool,
    pub version: ApiVersion,
}

impl MultipolygonTimeseriesParams {
    pub fn new(asset_id: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            asset_id: asset_id.into(),
            start_date,
            end_date,
            model: "Ensemble".to_string(),
            variables: vec!["ET".to_string()],
            attributes: Vec::new(),
            reducer: Reducer::default(),
            reference_et: ReferenceEt::default(),
            units: Units::default(),
            interval: Interval::default(),
            provisional: false,
            version: ApiVersion::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_variables<I, S>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variables = variables.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_reducer(mut self, reducer: Reducer) -> Self {
        self.reducer = reducer;
        self
    }

    pub fn with_reference_et(mut self, reference_et: ReferenceEt) -> Self {
        self.reference_et = reference_et;
        self
    }

    pub fn with_units(mut self, units: Units) -> Self {
        self.units = units;
        self
    }

    pub fn with_interval(mut self, interval: Interval) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_provisional(mut self, provisional: bool) -> Self {
        self.provisional = provisional;
        self
    }

    pub fn with_version(mut self, version: ApiVersion) -> Self {
        self.version = version;
        self
    }
}

impl IntoParams for MultipolygonTimeseriesParams {
    fn into_params(self) -> RequestParameters {
        RequestParameters::new()
            .with("asset_id", self.asset_id)
            .with("start_date", self.start_date)
            .with("end_date", self.end_date)
            .with("model", self.model)
            .with("variables", self.variables)
            .with("attributes", self.attributes)
            .with("reducer", self.reducer.as_str())
            .with("reference_et", self.reference_et.as_str())
            .with("units", self.units.code())
            .with("interval", self.interval.as_str())
            .with("provisional", self.provisional)
            .with("version", self.version.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn fields_params_lower_with_defaults() {
        let params = FieldsTimeseriesParams::new(["06_0001"], date(2021, 1, 1), date(2021, 12, 31))
            .into_params();

        assert_eq!(params.texts("field_ids"), vec!["06_0001"]);
        assert_eq!(params.text("start_date"), Some("2021-01-01"));
        assert_eq!(params.text("model"), Some("Ensemble"));
        assert_eq!(params.texts("variables"), vec!["ET"]);
        assert_eq!(params.text("units"), Some("mm"));
    }

    #[test]
    fn multipolygon_params_carry_version_and_flag() {
        let params = MultipolygonTimeseriesParams::new("projects/x/assets/y", date(2020, 1, 1), date(2020, 6, 30))
            .with_version(ApiVersion::V1)
            .with_provisional(true)
            .into_params();

        assert_eq!(params.text("version"), Some("v1"));
        assert_eq!(params.get("provisional"), Some(&ParamValue::Bool(true)));
        assert_eq!(params.texts("attributes"), Vec::<&str>::new());
    }

    #[test]
    fn units_codes_round_trip() {
        for units in [Units::Millimeters, Units::Inches] {
            assert_eq!(Units::from_code(units.code()), Some(units));
        }
        assert_eq!(Units::from_code("IN"), Some(Units::Inches));
        assert_eq!(Units::Inches.label(), "inches");
        assert_eq!(Units::from_code("ft"), None);
    }

    #[test]
    fn texts_treats_scalar_as_single_item() {
        let params = RequestParameters::new().with("variable", "ET");
        assert_eq!(params.texts("variable"), vec!["ET"]);
        assert!(params.texts("missing").is_empty());
    }
}

use chrono::NaiveDate;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::catalog::{
    ApiVersion, DefaultValue, HttpMethod, OperationDescriptor, OperationId, ParamKind, ParamSpec,
    WireField,
};
use crate::error::ValidationError;
use crate::params::{ParamValue, RequestParameters};
use crate::util::urljoin;

pub(crate) const AUTHORIZATION: &str = "Authorization";
pub(crate) const ACCEPT: &str = "Accept";
pub(crate) const CONTENT_TYPE: &str = "Content-Type";

/// Fully resolved request, ready for a [`Transport`](crate::Transport).
#[derive(Clone, PartialEq)]
pub struct WireRequest {
    pub operation: Option<OperationId>,
    pub method: HttpMethod,
    /// Absolute URL without the query string.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl WireRequest {
    /// A bare GET, used for following result links.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            operation: None,
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for WireRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(k, v)| {
                if k.eq_ignore_ascii_case(AUTHORIZATION) {
                    (k.as_str(), "<redacted>")
                } else {
                    (k.as_str(), v.as_str())
                }
            })
            .collect();
        f.debug_struct("WireRequest")
            .field("operation", &self.operation)
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &headers)
            .field("query", &self.query)
            .field("body", &self.body)
            .finish()
    }
}

/// A parameter after defaults were merged and its kind was checked.
#[derive(Debug, Clone, PartialEq)]
enum Resolved {
    Text(String),
    Number(f64),
    Bool(bool),
    List(Vec<String>),
    Coords(Vec<f64>),
}

impl Resolved {
    fn to_json(&self) -> Value {
        match self {
            Resolved::Text(s) => Value::String(s.clone()),
            Resolved::Number(n) => json!(n),
            Resolved::Bool(b) => Value::String(bool_str(*b).to_string()),
            Resolved::List(items) => json!(items),
            Resolved::Coords(coords) => json!(coords),
        }
    }

    fn to_query(&self) -> String {
        match self {
            Resolved::Text(s) => s.clone(),
            Resolved::Number(n) => n.to_string(),
            Resolved::Bool(b) => bool_str(*b).to_string(),
            Resolved::List(items) => items.join(","),
            Resolved::Coords(coords) => coords
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    fn into_value(self) -> ParamValue {
        match self {
            Resolved::Text(s) => ParamValue::Text(s),
            Resolved::Number(n) => ParamValue::Number(n),
            Resolved::Bool(b) => ParamValue::Bool(b),
            Resolved::List(items) => ParamValue::List(items),
            Resolved::Coords(coords) => ParamValue::Coords(coords),
        }
    }

    fn is_empty_list(&self) -> bool {
        match self {
            Resolved::List(items) => items.is_empty(),
            Resolved::Coords(coords) => coords.is_empty(),
            _ => false,
        }
    }
}

// The API only accepts string-typed booleans.
fn bool_str(b: bool) -> &'static str {
    if b { "true" } else { "false" }
}

fn is_blank(value: &ParamValue) -> bool {
    match value {
        ParamValue::Text(s) => s.trim().is_empty(),
        ParamValue::List(items) => items.iter().all(|s| s.trim().is_empty()),
        ParamValue::Coords(coords) => coords.is_empty(),
        ParamValue::Number(_) | ParamValue::Bool(_) => false,
    }
}

/// Splits a flat `[lon, lat, ...]` list into ordered vertex pairs.
///
/// Topology (closure, self-intersection) is left to the caller.
pub fn coordinate_pairs(flat: &[f64]) -> Result<Vec<(f64, f64)>, ValidationError> {
    if flat.len() % 2 != 0 {
        return Err(ValidationError::Geometry(format!(
            "expected an even number of coordinates, got {}",
            flat.len()
        )));
    }
    if flat.len() < 6 {
        return Err(ValidationError::Geometry(format!(
            "expected at least 3 longitude/latitude pairs, got {}",
            flat.len() / 2
        )));
    }
    if let Some(bad) = flat.iter().find(|c| !c.is_finite()) {
        return Err(ValidationError::Geometry(format!(
            "coordinate {} is not a finite number",
            bad
        )));
    }
    Ok(flat.chunks_exact(2).map(|p| (p[0], p[1])).collect())
}

fn parse_date(param: &str, s: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::invalid(param, format!("`{}` is not a YYYY-MM-DD date", s)))
}

fn parse_bool(param: &str, s: &str) -> Result<bool, ValidationError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ValidationError::invalid(
            param,
            format!("`{}` is not a boolean", s),
        )),
    }
}

fn from_default(default: &DefaultValue) -> ParamValue {
    match default {
        DefaultValue::Text(s) => ParamValue::Text(s.to_string()),
        DefaultValue::Bool(b) => ParamValue::Bool(*b),
        DefaultValue::TextList(items) => ParamValue::List(items.iter().map(|s| s.to_string()).collect()),
    }
}

fn resolve(spec: &ParamSpec, value: ParamValue) -> Result<Resolved, ValidationError> {
    let name = spec.name;
    let mismatch = |expected: &str| ValidationError::invalid(name, format!("expected {}", expected));

    match spec.kind {
        ParamKind::Text => match value {
            ParamValue::Text(s) => Ok(Resolved::Text(s.trim().to_string())),
            _ => Err(mismatch("text")),
        },
        ParamKind::Number => match value {
            ParamValue::Number(n) if n.is_finite() => Ok(Resolved::Number(n)),
            ParamValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(Resolved::Number)
                .ok_or_else(|| mismatch("a number")),
            _ => Err(mismatch("a number")),
        },
        ParamKind::Bool => match value {
            ParamValue::Bool(b) => Ok(Resolved::Bool(b)),
            ParamValue::Text(s) => parse_bool(name, &s).map(Resolved::Bool),
            _ => Err(mismatch("a boolean")),
        },
        ParamKind::Date => match value {
            ParamValue::Text(s) => {
                let d = parse_date(name, &s)?;
                Ok(Resolved::Text(d.format("%Y-%m-%d").to_string()))
            }
            _ => Err(mismatch("a YYYY-MM-DD date")),
        },
        ParamKind::TextList => match value {
            ParamValue::List(items) => Ok(Resolved::List(
                items
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            )),
            ParamValue::Text(s) => Ok(Resolved::List(vec![s.trim().to_string()])),
            _ => Err(mismatch("a list of text values")),
        },
        ParamKind::Geometry => match value {
            ParamValue::Coords(coords) => {
                let pairs = coordinate_pairs(&coords)?;
                Ok(Resolved::Coords(
                    pairs.into_iter().flat_map(|(lon, lat)| [lon, lat]).collect(),
                ))
            }
            _ => Err(ValidationError::Geometry(
                "expected a flat list of coordinates".to_string(),
            )),
        },
        ParamKind::Choice(options) => match value {
            ParamValue::Text(s) => {
                let s = s.trim();
                // Sent in the catalog's spelling, whatever case the caller used.
                if let Some(canonical) = options.iter().find(|o| o.eq_ignore_ascii_case(s)) {
                    Ok(Resolved::Text(canonical.to_string()))
                } else {
                    Err(ValidationError::invalid(
                        name,
                        format!("`{}` is not one of: {}", s, options.join(", ")),
                    ))
                }
            }
            _ => Err(mismatch("text")),
        },
    }
}

/// A wire request plus the parameter values it was built from.
///
/// `params` holds every value after trimming, defaulting and case folding,
/// which is what the normalizer must read back.
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub request: WireRequest,
    pub params: RequestParameters,
}

/// Builds the wire request for one call. Performs no I/O.
///
/// Unknown parameters are rejected; defaults from the descriptor fill in
/// whatever the caller left out.
pub fn build(
    descriptor: &OperationDescriptor,
    params: &RequestParameters,
    base_url: &str,
    credential: &str,
) -> Result<WireRequest, ValidationError> {
    prepare(descriptor, params, base_url, credential).map(|prepared| prepared.request)
}

/// Like [`build`], also returning the resolved parameters.
pub fn prepare(
    descriptor: &OperationDescriptor,
    params: &RequestParameters,
    base_url: &str,
    credential: &str,
) -> Result<Prepared, ValidationError> {
    if let Some((name, _)) = params.iter().find(|(name, _)| descriptor.param(name).is_none()) {
        return Err(ValidationError::UnknownParam(name.to_string()));
    }

    let mut missing: Vec<String> = descriptor
        .required_params()
        .filter(|spec| params.get(spec.name).is_none_or(is_blank))
        .map(|spec| spec.name.to_string())
        .collect();
    if credential.trim().is_empty() {
        missing.push("api_key".to_string());
    }
    if !missing.is_empty() {
        return Err(ValidationError::MissingParams(missing));
    }

    let mut resolved: BTreeMap<&str, Resolved> = BTreeMap::new();
    for spec in descriptor.params {
        let value = match params.get(spec.name) {
            Some(v) => v.clone(),
            None => match &spec.default {
                Some(default) => from_default(default),
                None => continue,
            },
        };
        resolved.insert(spec.name, resolve(spec, value)?);
    }

    check_date_order(&resolved)?;
    check_variables(descriptor, &resolved)?;

    let version = match resolved.get("version") {
        Some(Resolved::Text(v)) if v.eq_ignore_ascii_case("v1") => Some(ApiVersion::V1),
        Some(Resolved::Text(_)) => Some(ApiVersion::V2),
        _ => None,
    };
    let encoding = descriptor.encoding(version).ok_or_else(|| {
        ValidationError::invalid("version", "no wire encoding for this version")
    })?;

    let mut body = Map::new();
    let mut query = Vec::new();
    for field in encoding.fields {
        let (key, value) = match field {
            WireField::Value { key, param } => match resolved.get(param) {
                Some(v) => (*key, v.clone()),
                None => continue,
            },
            WireField::AsList { key, param } => match resolved.get(param) {
                Some(Resolved::Text(s)) => (*key, Resolved::List(vec![s.clone()])),
                Some(v) => (*key, v.clone()),
                None => continue,
            },
            WireField::DateRange { key, start, end } => {
                match (resolved.get(start), resolved.get(end)) {
                    (Some(Resolved::Text(s)), Some(Resolved::Text(e))) => {
                        (*key, Resolved::List(vec![s.clone(), e.clone()]))
                    }
                    _ => continue,
                }
            }
            WireField::Const { key, value } => (*key, Resolved::Text(value.to_string())),
        };

        match encoding.method {
            HttpMethod::Post => {
                body.insert(key.to_string(), value.to_json());
            }
            HttpMethod::Get => {
                if !value.is_empty_list() {
                    query.push((key.to_string(), value.to_query()));
                }
            }
        }
    }

    let mut headers = vec![
        (AUTHORIZATION.to_string(), credential.trim().to_string()),
        (ACCEPT.to_string(), encoding.accept.to_string()),
    ];
    let body = match encoding.method {
        HttpMethod::Post => {
            headers.push((CONTENT_TYPE.to_string(), "application/json".to_string()));
            Some(Value::Object(body))
        }
        HttpMethod::Get => None,
    };

    let request = WireRequest {
        operation: Some(descriptor.id),
        method: encoding.method,
        url: urljoin(base_url, descriptor.endpoint),
        headers,
        query,
        body,
    };
    debug!(
        operation = descriptor.name,
        method = %request.method,
        url = %request.url,
        version = encoding.version.as_str(),
        "built wire request"
    );

    let mut effective = RequestParameters::new();
    for (name, value) in resolved {
        effective.insert(name, value.into_value());
    }
    Ok(Prepared {
        request,
        params: effective,
    })
}

fn check_date_order(resolved: &BTreeMap<&str, Resolved>) -> Result<(), ValidationError> {
    if let (Some(Resolved::Text(s)), Some(Resolved::Text(e))) =
        (resolved.get("start_date"), resolved.get("end_date"))
    {
        let start = parse_date("start_date", s)?;
        let end = parse_date("end_date", e)?;
        if start > end {
            return Err(ValidationError::invalid(
                "end_date",
                format!("{} is before start_date {}", end, start),
            ));
        }
    }
    Ok(())
}

fn check_variables(
    descriptor: &OperationDescriptor,
    resolved: &BTreeMap<&str, Resolved>,
) -> Result<(), ValidationError> {
    let param = match descriptor.row_schema() {
        Some(schema) => schema.variable_param,
        None => match descriptor.param("variables") {
            Some(spec) => spec.name,
            None => return Ok(()),
        },
    };

    let names: Vec<&str> = match resolved.get(param) {
        Some(Resolved::Text(s)) => vec![s.as_str()],
        Some(Resolved::List(items)) => items.iter().map(|s| s.as_str()).collect(),
        _ => return Ok(()),
    };
    if names.is_empty() {
        return Err(ValidationError::invalid(param, "at least one variable is required"));
    }
    for name in names {
        if descriptor.variable(name).is_none() {
            let known: Vec<&str> = descriptor.variables.iter().map(|v| v.name).collect();
            return Err(ValidationError::invalid(
                param,
                format!("unknown variable `{}` (expected one of: {})", name, known.join(", ")),
            ));
        }
    }
    Ok(())
}

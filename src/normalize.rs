//! Turns raw responses into canonical results or classified failures.

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::catalog::{DefaultValue, OperationDescriptor, OutputSchema, ResponseShape, RowSchema};
use crate::error::{ErrorRecord, classify};
use crate::params::{RequestParameters, Units};
use crate::quota::QuotaRecord;
use crate::timeseries::{Column, LongRecord, TimeSeries, pivot_wide};
use crate::transport::RawResponse;
use crate::util::{leading_date, mm_to_inches};

/// Successful result of one call, by response shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Rows(TimeSeries),
    Quota(QuotaRecord),
    /// Link to a file the server produced; returned unchanged.
    Url(String),
}

impl Normalized {
    pub fn into_rows(self) -> Option<TimeSeries> {
        match self {
            Normalized::Rows(series) => Some(series),
            _ => None,
        }
    }

    pub fn into_quota(self) -> Option<QuotaRecord> {
        match self {
            Normalized::Quota(record) => Some(record),
            _ => None,
        }
    }

    pub fn into_url(self) -> Option<String> {
        match self {
            Normalized::Url(url) => Some(url),
            _ => None,
        }
    }
}

/// Value for `name`, falling back to the descriptor default.
///
/// Expects the parameters as resolved by [`prepare`](crate::request::prepare).
fn effective_text<'a>(
    descriptor: &'a OperationDescriptor,
    params: &'a RequestParameters,
    name: &str,
) -> Option<&'a str> {
    params.text(name).map(str::trim).or_else(|| match descriptor.param(name)?.default {
        Some(DefaultValue::Text(s)) => Some(s),
        _ => None,
    })
}

fn effective_list<'a>(
    descriptor: &'a OperationDescriptor,
    params: &'a RequestParameters,
    name: &str,
) -> Vec<&'a str> {
    let given: Vec<&str> = params
        .texts(name)
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if !given.is_empty() {
        return given;
    }
    match descriptor.param(name).and_then(|p| p.default) {
        Some(DefaultValue::TextList(items)) => items.to_vec(),
        Some(DefaultValue::Text(s)) => vec![s],
        _ => Vec::new(),
    }
}

pub fn normalize(
    descriptor: &OperationDescriptor,
    response: &RawResponse,
    params: &RequestParameters,
) -> Result<Normalized, ErrorRecord> {
    if !response.is_success() {
        let record = classify(response.status, &response.body, descriptor.server_error_hint);
        warn!(
            operation = descriptor.name,
            status = response.status,
            kind = %record.kind,
            "request failed"
        );
        return Err(record);
    }

    let result = match (descriptor.response_shape, &descriptor.output_schema) {
        (ResponseShape::JsonListOfObjects, OutputSchema::Rows(schema)) => {
            normalize_rows(descriptor, schema, response, params).map(Normalized::Rows)
        }
        (ResponseShape::JsonObject, OutputSchema::Record { fields }) => {
            normalize_record(response, fields).map(Normalized::Quota)
        }
        (ResponseShape::CsvUrl, OutputSchema::Url { keys }) => {
            extract_url(response, keys).map(Normalized::Url)
        }
        _ => Err(ErrorRecord::malformed_with_status(
            response.status,
            format!("{} declares an output schema that does not fit its response shape", descriptor.name),
        )),
    };

    if let Err(record) = &result {
        warn!(operation = descriptor.name, detail = ?record.server_message, "malformed response");
    }
    result
}

fn parse_json(response: &RawResponse) -> Result<Value, ErrorRecord> {
    serde_json::from_slice(&response.body)
        .map_err(|e| ErrorRecord::malformed_with_status(response.status, format!("invalid JSON: {}", e)))
}

/// Reads a CSV table into row objects. Cells stay text so ids such as `0001` survive.
fn parse_csv_objects(response: &RawResponse) -> Result<Vec<Map<String, Value>>, ErrorRecord> {
    let malformed = |e: csv::Error| {
        ErrorRecord::malformed_with_status(response.status, format!("invalid CSV: {}", e))
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(response.body.as_slice());
    let headers = reader.headers().map_err(malformed)?.clone();

    let mut objects = Vec::new();
    for record in reader.records() {
        let record = record.map_err(malformed)?;
        let object: Map<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(k, v)| {
                let value = if v.is_empty() {
                    Value::Null
                } else {
                    Value::String(v.to_string())
                };
                (k.to_string(), value)
            })
            .collect();
        objects.push(object);
    }
    Ok(objects)
}

fn first_str<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| object.get(*k).and_then(|v| v.as_str()))
}

fn entity_of(object: &Map<String, Value>, schema: &RowSchema) -> Option<String> {
    schema
        .entity_keys
        .iter()
        .find_map(|k| match object.get(*k) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .or_else(|| schema.fixed_entity.map(str::to_string))
}

/// `Ok(None)` for an explicit null; `Err` for values that are not numeric.
fn numeric(value: &Value) -> Result<Option<f64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n.as_f64().map(Some).ok_or_else(|| n.to_string()),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s.trim().parse::<f64>().map(Some).map_err(|_| s.clone()),
        other => Err(other.to_string()),
    }
}

fn normalize_rows(
    descriptor: &OperationDescriptor,
    schema: &RowSchema,
    response: &RawResponse,
    params: &RequestParameters,
) -> Result<TimeSeries, ErrorRecord> {
    let malformed = |detail: String| ErrorRecord::malformed_with_status(response.status, detail);

    let units = match effective_text(descriptor, params, schema.units_param) {
        Some(code) => Units::from_code(code)
            .ok_or_else(|| malformed(format!("unrecognized units `{}`", code)))?,
        None => Units::default(),
    };
    let default_model = effective_text(descriptor, params, schema.model_param).unwrap_or("");
    let convert = !descriptor.units_applied_upstream && units == Units::Inches;

    let mut columns: Vec<Column> = effective_list(descriptor, params, schema.variable_param)
        .into_iter()
        .map(|name| column_for(descriptor, name))
        .collect();

    let csv_requested = effective_text(descriptor, params, "file_format")
        .is_some_and(|f| f.eq_ignore_ascii_case("csv"));
    let objects = if csv_requested {
        parse_csv_objects(response)?
    } else {
        match parse_json(response)? {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(object) => Ok(object),
                    other => Err(malformed(format!("row {}: expected an object, got {}", i, other))),
                })
                .collect::<Result<Vec<_>, _>>()?,
            // A single-row result sometimes arrives unwrapped.
            Value::Object(object) => vec![object],
            other => {
                return Err(malformed(format!(
                    "expected a list of row objects, got {}",
                    json_type(&other)
                )));
            }
        }
    };

    let mut records = Vec::with_capacity(objects.len() * columns.len().max(1));
    for (i, object) in objects.iter().enumerate() {
        let date = first_str(object, schema.date_keys)
            .and_then(leading_date)
            .ok_or_else(|| malformed(format!("row {}: missing or unparseable date", i)))?;
        let entity_id = entity_of(object, schema)
            .ok_or_else(|| malformed(format!("row {}: missing entity id", i)))?;
        let model = first_str(object, schema.model_keys)
            .unwrap_or(default_model)
            .to_string();

        let mut push = |columns: &[Column], variable: &str, raw: &Value| -> Result<(), ErrorRecord> {
            let value = numeric(raw)
                .map_err(|v| malformed(format!("row {}: `{}` is not a number", i, v)))?;
            let convertible = columns
                .iter()
                .any(|c| c.name == variable && c.convertible);
            records.push(LongRecord {
                date,
                entity_id: entity_id.clone(),
                model: model.clone(),
                variable: variable.to_string(),
                value: if convert && convertible {
                    value.map(mm_to_inches)
                } else {
                    value
                },
            });
            Ok(())
        };

        // Long rows name their variable; wide rows carry one key per variable.
        if let Some(variable) = first_str(object, schema.variable_keys) {
            let variable = variable.to_lowercase();
            let raw = schema
                .value_keys
                .iter()
                .find_map(|k| object.get(*k))
                .ok_or_else(|| malformed(format!("row {}: missing value for {}", i, variable)))?;
            if !columns.iter().any(|c| c.name == variable) {
                columns.push(column_for(descriptor, &variable));
            }
            push(&columns, &variable, raw)?;
            continue;
        }

        for column in &columns {
            let raw = object
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(&column.name))
                .map(|(_, v)| v)
                .or_else(|| {
                    if columns.len() == 1 {
                        schema.value_keys.iter().find_map(|k| object.get(*k))
                    } else {
                        None
                    }
                })
                .ok_or_else(|| malformed(format!("row {}: missing value for {}", i, column.name)))?;
            push(&columns, &column.name, raw)?;
        }
    }

    let series = pivot_wide(records, columns, units);
    info!(
        operation = descriptor.name,
        rows = series.len(),
        units = units.code(),
        "normalized time series"
    );
    Ok(series)
}

fn column_for(descriptor: &OperationDescriptor, variable: &str) -> Column {
    match descriptor.variable(variable) {
        Some(spec) => Column {
            name: spec.column(),
            convertible: spec.convert_units,
        },
        None => Column {
            name: variable.to_lowercase(),
            convertible: false,
        },
    }
}

fn normalize_record(response: &RawResponse, fields: &[&str]) -> Result<QuotaRecord, ErrorRecord> {
    match parse_json(response)? {
        Value::Object(object) => Ok(QuotaRecord::from_object(&object, fields)),
        other => Err(ErrorRecord::malformed_with_status(
            response.status,
            format!("expected an object, got {}", json_type(&other)),
        )),
    }
}

fn is_link(s: &str) -> bool {
    s.starts_with("https://") || s.starts_with("http://") || s.starts_with("gs://")
}

fn extract_url(response: &RawResponse, keys: &[&str]) -> Result<String, ErrorRecord> {
    let text = response.text();
    let text = text.trim();

    let found = if text.starts_with('{') || text.starts_with('"') {
        match parse_json(response)? {
            Value::String(s) => Some(s),
            Value::Object(object) => first_str(&object, keys).map(str::to_string),
            _ => None,
        }
    } else {
        Some(text.to_string())
    };

    match found {
        Some(url) if is_link(url.trim()) => Ok(url.trim().to_string()),
        _ => Err(ErrorRecord::malformed_with_status(
            response.status,
            format!("expected a result URL, got `{}`", text),
        )),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

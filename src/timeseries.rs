//! Canonical time-series rows and the long to wide pivot.

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;
use std::io::Write;

use crate::params::Units;
use crate::util::{inches_to_mm, mm_to_inches};

/// One variable observation before pivoting.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRecord {
    pub date: NaiveDate,
    pub entity_id: String,
    pub model: String,
    /// Column name of the variable (lower-case, e.g. `et`).
    pub variable: String,
    pub value: Option<f64>,
}

/// A value column of a [`TimeSeries`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    /// Depth variable that follows the requested unit.
    pub convertible: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRow {
    pub date: NaiveDate,
    pub year: i32,
    pub month: u32,
    /// Day of year, 1-based.
    pub julian_day: u32,
    /// Field id, or `polygon` for single-polygon requests.
    pub entity_id: String,
    /// One entry per column of the owning series, in column order.
    pub values: Vec<(String, Option<f64>)>,
    pub units: String,
    pub model: String,
}

impl CanonicalRow {
    pub fn new(date: NaiveDate, entity_id: impl Into<String>, model: impl Into<String>, units: Units) -> Self {
        Self {
            date,
            year: date.year(),
            month: date.month(),
            julian_day: date.ordinal(),
            entity_id: entity_id.into(),
            values: Vec::new(),
            units: units.code().to_string(),
            model: model.into(),
        }
    }

    pub fn value(&self, column: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, v)| *v)
    }
}

/// Wide table: one row per `(date, entity_id)`, one column per variable.
///
/// Rows keep the order in which the server returned them.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    columns: Vec<Column>,
    rows: Vec<CanonicalRow>,
    units: Units,
}

impl TimeSeries {
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[CanonicalRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<CanonicalRow> {
        self.rows
    }

    pub fn units(&self) -> Units {
        self.units
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_values(&self, column: &str) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.value(column)).collect()
    }

    /// Re-expresses the convertible columns in another unit.
    pub fn with_units(mut self, units: Units) -> Self {
        if units == self.units {
            return self;
        }
        let convert: fn(f64) -> f64 = match units {
            Units::Inches => mm_to_inches,
            Units::Millimeters => inches_to_mm,
        };
        for row in &mut self.rows {
            for (name, value) in &mut row.values {
                let convertible = self
                    .columns
                    .iter()
                    .any(|c| c.convertible && c.name == *name);
                if convertible {
                    *value = value.map(convert);
                }
            }
            row.units = units.code().to_string();
        }
        self.units = units;
        self
    }

    /// Writes `date,year,month,julian_day,entity_id,<columns...>,units,model`.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header: Vec<&str> = vec!["date", "year", "month", "julian_day", "entity_id"];
        header.extend(self.columns.iter().map(|c| c.name.as_str()));
        header.extend(["units", "model"]);
        wtr.write_record(&header).context("writing CSV header")?;

        for row in &self.rows {
            let mut record = vec![
                row.date.format("%Y-%m-%d").to_string(),
                row.year.to_string(),
                row.month.to_string(),
                row.julian_day.to_string(),
                row.entity_id.clone(),
            ];
            record.extend(
                row.values
                    .iter()
                    .map(|(_, v)| v.map(|v| v.to_string()).unwrap_or_default()),
            );
            record.push(row.units.clone());
            record.push(row.model.clone());
            wtr.write_record(&record).context("writing CSV record")?;
        }

        wtr.flush().context("flushing CSV writer")?;
        Ok(())
    }
}

/// Pivots long records into one row per `(date, entity_id)`.
///
/// `columns` fixes the output column order; every row gets every column,
/// `None` where the server sent no value.
pub fn pivot_wide(records: Vec<LongRecord>, columns: Vec<Column>, units: Units) -> TimeSeries {
    let mut index: HashMap<(NaiveDate, String), usize> = HashMap::new();
    let mut rows: Vec<CanonicalRow> = Vec::new();

    for record in records {
        let key = (record.date, record.entity_id.clone());
        let slot = *index.entry(key).or_insert_with(|| {
            let mut row = CanonicalRow::new(record.date, record.entity_id.clone(), record.model.clone(), units);
            row.values = columns.iter().map(|c| (c.name.clone(), None)).collect();
            rows.push(row);
            rows.len() - 1
        });

        if let Some((_, value)) = rows[slot]
            .values
            .iter_mut()
            .find(|(name, _)| *name == record.variable)
        {
            *value = record.value;
        }
    }

    TimeSeries {
        columns,
        rows,
        units,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(d: NaiveDate, entity: &str, variable: &str, value: f64) -> LongRecord {
        LongRecord {
            date: d,
            entity_id: entity.to_string(),
            model: "ensemble".to_string(),
            variable: variable.to_string(),
            value: Some(value),
        }
    }

    fn columns() -> Vec<Column> {
        vec![
            Column {
                name: "et".into(),
                convertible: true,
            },
            Column {
                name: "pr".into(),
                convertible: false,
            },
        ]
    }

    #[test]
    fn date_parts_are_derived() {
        let row = CanonicalRow::new(date(2021, 3, 15), "0001", "ensemble", Units::Inches);
        assert_eq!(row.year, 2021);
        assert_eq!(row.month, 3);
        assert_eq!(row.julian_day, 74);
        assert_eq!(row.units, "in");

        let leap = CanonicalRow::new(date(2020, 12, 31), "0001", "ensemble", Units::Millimeters);
        assert_eq!(leap.julian_day, 366);
    }

    #[test]
    fn pivot_groups_by_date_and_entity() {
        let records = vec![
            record(date(2021, 1, 1), "A", "et", 10.0),
            record(date(2021, 1, 1), "A", "pr", 30.0),
            record(date(2021, 1, 1), "B", "et", 11.0),
            record(date(2021, 2, 1), "A", "et", 12.0),
            record(date(2021, 2, 1), "A", "pr", 5.0),
        ];
        let series = pivot_wide(records, columns(), Units::Millimeters);

        assert_eq!(series.len(), 3);
        let first = &series.rows()[0];
        assert_eq!(first.entity_id, "A");
        assert_eq!(first.value("et"), Some(10.0));
        assert_eq!(first.value("pr"), Some(30.0));

        let second = &series.rows()[1];
        assert_eq!(second.entity_id, "B");
        assert_eq!(second.value("pr"), None);

        assert_eq!(series.column_values("et"), vec![Some(10.0), Some(11.0), Some(12.0)]);
    }

    #[test]
    fn with_units_only_touches_convertible_columns() {
        let records = vec![
            record(date(2021, 1, 1), "A", "et", 25.4),
            record(date(2021, 1, 1), "A", "pr", 50.8),
        ];
        let series = pivot_wide(records, columns(), Units::Millimeters).with_units(Units::Inches);

        let row = &series.rows()[0];
        assert!((row.value("et").unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(row.value("pr"), Some(50.8));
        assert_eq!(row.units, "in");
        assert_eq!(series.units(), Units::Inches);

        let back = series.with_units(Units::Millimeters);
        assert!((back.rows()[0].value("et").unwrap() - 25.4).abs() < 1e-9);
    }

    #[test]
    fn csv_export_has_canonical_header() {
        let records = vec![record(date(2021, 3, 15), "A", "et", 2.5)];
        let series = pivot_wide(records, columns(), Units::Millimeters);

        let mut out = Vec::new();
        series.write_csv(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("date,year,month,julian_day,entity_id,et,pr,units,model")
        );
        assert_eq!(lines.next(), Some("2021-03-15,2021,3,74,A,2.5,,mm,ensemble"));
    }
}

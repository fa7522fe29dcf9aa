use anyhow::{Context, Result};
use chrono::NaiveDate;
use openet::{Client, FieldsTimeseriesParams, Interval, Units};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    // Set RUST_LOG=openet=debug for request-level output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Configure authentication via env vars or a `.openetrc` file.
    let client = Client::from_env()?;

    let start = NaiveDate::from_ymd_opt(2021, 1, 1).context("bad start date")?;
    let end = NaiveDate::from_ymd_opt(2021, 12, 31).context("bad end date")?;
    let params = FieldsTimeseriesParams::new(["06032233", "06032234"], start, end)
        .with_variables(["ET", "PR"])
        .with_interval(Interval::Monthly)
        .with_units(Units::Inches);

    let series = client.fields_timeseries(params)?;
    let file = std::fs::File::create("fields_et.csv")?;
    series.write_csv(file)?;
    println!("wrote {} row(s) to fields_et.csv", series.len());
    Ok(())
}

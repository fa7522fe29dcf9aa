use anyhow::Result;
use openet::Client;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let client = Client::from_env()?;
    let quota = client.account_quota()?;
    println!("{}", quota.summary());
    Ok(())
}

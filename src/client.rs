use anyhow::Context;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::catalog::{OperationDescriptor, OperationId};
use crate::config::load_config;
use crate::download::download_to;
use crate::error::{ErrorRecord, Result};
use crate::normalize::{Normalized, normalize};
use crate::params::{
    FieldsTimeseriesParams, IntoParams, MultipolygonTimeseriesParams, PolygonTimeseriesParams,
    RequestParameters,
};
use crate::quota::QuotaRecord;
use crate::request::prepare;
use crate::timeseries::TimeSeries;
use crate::transport::{HttpTransport, Transport, TransportConfig};

#[derive(Clone)]
pub struct ClientConfig {
    /// Base API URL, typically `https://openet-api.org`.
    pub url: String,
    /// API key, sent verbatim in the `Authorization` header.
    pub key: String,
    /// Whether to verify TLS certificates.
    pub verify: bool,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &self.url)
            .field("key", &"<redacted>")
            .field("verify", &self.verify)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Clone)]
pub struct Client {
    url: String,
    key: String,
    progress: bool,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.url)
            .field("key", &"<redacted>")
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client using environment variables and/or `.openetrc`.
    ///
    /// This is equivalent to `Client::new(None, None, None)`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::new(None, None, None)
    }

    /// Creates a client using (in order of precedence):
    /// - explicit `url`/`key` arguments
    /// - environment variables `OPENET_API_URL` / `OPENET_API_KEY`
    /// - config file from `OPENET_RC` or `.openetrc`
    pub fn new(url: Option<String>, key: Option<String>, verify: Option<bool>) -> anyhow::Result<Self> {
        let cfg = load_config(url, key, verify)?;
        Self::from_config(cfg)
    }

    pub fn from_config(cfg: ClientConfig) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(&TransportConfig {
            timeout: cfg.timeout,
            verify: cfg.verify,
        })
        .context("failed to set up HTTP transport")?;
        Ok(Self::with_transport(cfg.url, cfg.key, transport))
    }

    /// Client over a caller-supplied transport, e.g. a canned one in tests.
    pub fn with_transport(
        url: impl Into<String>,
        key: impl Into<String>,
        transport: impl Transport + 'static,
    ) -> Self {
        Self {
            url: url.into(),
            key: key.into(),
            progress: true,
            transport: Arc::new(transport),
        }
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Runs one catalog operation: build, send once, normalize.
    ///
    /// Validation failures return before anything is sent.
    #[instrument(skip(self, descriptor, params), fields(operation = descriptor.name))]
    pub fn call(&self, descriptor: &OperationDescriptor, params: impl IntoParams) -> Result<Normalized> {
        let prepared = prepare(descriptor, &params.into_params(), &self.url, &self.key)?;
        let response = self.transport.send(&prepared.request)?;
        debug!(status = response.status, "normalizing response");
        Ok(normalize(descriptor, &response, &prepared.params)?)
    }

    /// Daily or monthly time series for one or more fields.
    pub fn fields_timeseries(&self, params: FieldsTimeseriesParams) -> Result<TimeSeries> {
        self.call(OperationId::FieldsTimeseries.descriptor(), params)?
            .into_rows()
            .ok_or_else(|| unexpected("rows").into())
    }

    /// Raster time series reduced over one polygon.
    pub fn polygon_timeseries(&self, params: PolygonTimeseriesParams) -> Result<TimeSeries> {
        self.call(OperationId::PolygonTimeseries.descriptor(), params)?
            .into_rows()
            .ok_or_else(|| unexpected("rows").into())
    }

    /// Starts a multipolygon export and returns the URL of the CSV it produces.
    pub fn multipolygon_timeseries(&self, params: MultipolygonTimeseriesParams) -> Result<String> {
        let url = self
            .call(OperationId::MultipolygonTimeseries.descriptor(), params)?
            .into_url()
            .ok_or_else(|| unexpected("a URL"))?;
        info!(%url, "multipolygon export ready");
        Ok(url)
    }

    /// Account usage and limits.
    pub fn account_quota(&self) -> Result<QuotaRecord> {
        let record = self
            .call(OperationId::AccountQuota.descriptor(), RequestParameters::new())?
            .into_quota()
            .ok_or_else(|| unexpected("a quota record"))?;
        for line in record.summary().lines() {
            info!("{}", line);
        }
        Ok(record)
    }

    /// Fetches a result file (e.g. a multipolygon export) to `target`.
    ///
    /// An empty `target` means: name the file after the last URL segment.
    pub fn download(&self, url: &str, target: &Path) -> anyhow::Result<PathBuf> {
        download_to(self.transport.as_ref(), url, target, self.progress)
    }
}

fn unexpected(what: &str) -> ErrorRecord {
    ErrorRecord::malformed(format!("operation did not produce {}", what))
}

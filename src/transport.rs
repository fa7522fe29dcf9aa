use anyhow::{Context, Result};
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, warn};

use crate::catalog::HttpMethod;
use crate::error::{TransportError, TransportErrorKind};
use crate::request::WireRequest;

/// Status and body of one HTTP exchange. Non-2xx statuses are ordinary values here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Outcome of [`Transport::fetch_to`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    /// Success body streamed into the sink; total bytes written.
    Written(u64),
    /// Non-2xx answer, returned whole and not written.
    Failed(RawResponse),
}

/// Called with bytes received so far and the expected total, when known.
pub type Progress<'a> = &'a mut dyn FnMut(u64, Option<u64>);

/// Performs exactly one attempt per request.
pub trait Transport: Send + Sync {
    fn send(&self, request: &WireRequest) -> Result<RawResponse, TransportError>;

    /// Streams a successful body into `sink` as it arrives.
    ///
    /// The default buffers through [`send`](Transport::send); transports that
    /// can read incrementally override it.
    fn fetch_to(
        &self,
        request: &WireRequest,
        sink: &mut dyn Write,
        progress: Progress<'_>,
    ) -> Result<Fetched, TransportError> {
        let resp = self.send(request)?;
        if !resp.is_success() {
            return Ok(Fetched::Failed(resp));
        }
        let total = resp.body.len() as u64;
        sink.write_all(&resp.body).map_err(write_error)?;
        progress(total, Some(total));
        Ok(Fetched::Written(total))
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&self, request: &WireRequest) -> Result<RawResponse, TransportError> {
        (**self).send(request)
    }

    fn fetch_to(
        &self,
        request: &WireRequest,
        sink: &mut dyn Write,
        progress: Progress<'_>,
    ) -> Result<Fetched, TransportError> {
        (**self).fetch_to(request, sink, progress)
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send(&self, request: &WireRequest) -> Result<RawResponse, TransportError> {
        (**self).send(request)
    }

    fn fetch_to(
        &self,
        request: &WireRequest,
        sink: &mut dyn Write,
        progress: Progress<'_>,
    ) -> Result<Fetched, TransportError> {
        (**self).fetch_to(request, sink, progress)
    }
}

fn write_error(err: std::io::Error) -> TransportError {
    TransportError::new(TransportErrorKind::Other, format!("failed to write body: {}", err))
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    /// Whether to verify TLS certificates. Only disable for trusted intercepting proxies.
    pub verify: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            verify: true,
        }
    }
}

/// Blocking `reqwest` transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: HttpClient,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("openet-rs/{}", env!("CARGO_PKG_VERSION")))
                .unwrap_or(HeaderValue::from_static("openet-rs")),
        );

        let mut builder = HttpClient::builder()
            .default_headers(default_headers)
            .timeout(config.timeout);

        if !config.verify {
            warn!("TLS certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder.build().context("failed to build HTTP client")?;
        Ok(Self { http })
    }
}

const CHUNK: usize = 64 * 1024;

impl HttpTransport {
    fn prepare(&self, request: &WireRequest) -> RequestBuilder {
        let mut req = match request.method {
            HttpMethod::Get => self.http.get(&request.url),
            HttpMethod::Post => self.http.post(&request.url),
        };
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }
        req
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &WireRequest) -> Result<RawResponse, TransportError> {
        debug!(method = %request.method, url = %request.url, "sending request");
        let resp = self.prepare(request).send()?;
        let status = resp.status().as_u16();
        let body = resp.bytes()?.to_vec();
        debug!(status, bytes = body.len(), "response received");

        Ok(RawResponse { status, body })
    }

    fn fetch_to(
        &self,
        request: &WireRequest,
        sink: &mut dyn Write,
        progress: Progress<'_>,
    ) -> Result<Fetched, TransportError> {
        debug!(method = %request.method, url = %request.url, "streaming request");
        let mut resp = self.prepare(request).send()?;
        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.bytes()?.to_vec();
            debug!(status, bytes = body.len(), "response received");
            return Ok(Fetched::Failed(RawResponse { status, body }));
        }

        let total = resp.content_length();
        let mut written: u64 = 0;
        let mut buf = vec![0u8; CHUNK];
        loop {
            let n = resp.read(&mut buf).map_err(|e| {
                TransportError::new(TransportErrorKind::Other, format!("download interrupted: {}", e))
            })?;
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n]).map_err(write_error)?;
            written += n as u64;
            progress(written, total);
        }
        sink.flush().map_err(write_error)?;
        debug!(status, bytes = written, "body streamed");

        Ok(Fetched::Written(written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        assert!(RawResponse::new(200, "").is_success());
        assert!(RawResponse::new(204, "").is_success());
        assert!(!RawResponse::new(302, "").is_success());
        assert!(!RawResponse::new(403, "").is_success());
    }

    struct Fixed(RawResponse);

    impl Transport for Fixed {
        fn send(&self, _request: &WireRequest) -> Result<RawResponse, TransportError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn default_fetch_writes_success_bodies_only() {
        let ok = Fixed(RawResponse::new(200, "a,b\n1,2\n"));
        let mut sink = Vec::new();
        let mut seen = Vec::new();
        let fetched = ok
            .fetch_to(&WireRequest::get("https://x.test/a.csv"), &mut sink, &mut |done, total| {
                seen.push((done, total))
            })
            .unwrap();
        assert_eq!(fetched, Fetched::Written(8));
        assert_eq!(sink, b"a,b\n1,2\n");
        assert_eq!(seen, vec![(8, Some(8))]);

        let gone = Fixed(RawResponse::new(404, "gone"));
        let mut sink = Vec::new();
        let fetched = gone
            .fetch_to(&WireRequest::get("https://x.test/a.csv"), &mut sink, &mut |_, _| {})
            .unwrap();
        assert_eq!(fetched, Fetched::Failed(RawResponse::new(404, "gone")));
        assert!(sink.is_empty());
    }

    #[test]
    fn builds_with_and_without_verification() {
        assert!(HttpTransport::new(&TransportConfig::default()).is_ok());
        let insecure = TransportConfig {
            verify: false,
            ..TransportConfig::default()
        };
        assert!(HttpTransport::new(&insecure).is_ok());
    }
}

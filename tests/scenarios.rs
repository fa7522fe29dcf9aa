use chrono::NaiveDate;
use openet::{
    ApiVersion, Client, Error, ErrorKind, MultipolygonTimeseriesParams, OperationId,
    PolygonTimeseriesParams, RawResponse, RequestParameters, Transport, TransportError,
    TransportErrorKind, Units, ValidationError, WireRequest,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

const BASE: &str = "https://openet.test";
const KEY: &str = "secret-key";

struct MockTransport {
    reply: Result<RawResponse, TransportError>,
    calls: Mutex<Vec<WireRequest>>,
}

impl MockTransport {
    fn replying(status: u16, body: impl Into<Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(RawResponse::new(status, body)),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn failing(err: TransportError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(err),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<WireRequest> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &WireRequest) -> Result<RawResponse, TransportError> {
        self.calls.lock().unwrap().push(request.clone());
        self.reply.clone()
    }
}

fn client(transport: &Arc<MockTransport>) -> Client {
    Client::with_transport(BASE, KEY, transport.clone()).with_progress(false)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn scenario_a_params() -> RequestParameters {
    RequestParameters::new()
        .with("field_ids", vec!["0001".to_string()])
        .with("start_date", "2021-01-01")
        .with("end_date", "2021-02-01")
        .with("model", "ensemble")
        .with("units", "in")
}

#[test]
fn fields_timeseries_converts_to_inches() {
    let transport = MockTransport::replying(
        200,
        json!({"time": "2021-01-01", "end_date": "2021-02-01", "feature_id": "0001", "value_mm": 25.4})
            .to_string(),
    );
    let series = client(&transport)
        .call(OperationId::FieldsTimeseries.descriptor(), scenario_a_params())
        .unwrap()
        .into_rows()
        .unwrap();

    assert_eq!(series.len(), 1);
    let row = &series.rows()[0];
    assert_eq!(row.date, date(2021, 1, 1));
    assert_eq!(row.year, 2021);
    assert_eq!(row.month, 1);
    assert_eq!(row.entity_id, "0001");
    assert!((row.value("et").unwrap() - 1.0).abs() < 1e-9);
    assert_eq!(row.units, "in");
    assert_eq!(series.units(), Units::Inches);

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    let sent = &calls[0];
    assert_eq!(sent.url, "https://openet.test/geodatabase/timeseries");
    assert_eq!(sent.header("Authorization"), Some(KEY));
    assert_eq!(sent.header("Content-Type"), Some("application/json"));
    let body = sent.body.as_ref().unwrap();
    assert_eq!(body["field_ids"], json!(["0001"]));
    assert_eq!(body["date_range"], json!(["2021-01-01", "2021-02-01"]));
}

#[test]
fn forbidden_is_classified_with_hint() {
    let transport = MockTransport::replying(403, r#"{"detail": "Invalid API key"}"#);
    let err = client(&transport)
        .call(OperationId::FieldsTimeseries.descriptor(), scenario_a_params())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Forbidden);
    let record = err.record().unwrap();
    assert_eq!(record.hint, "credential invalid, expired, or quota exceeded");
    assert_eq!(record.http_status, Some(403));
    assert_eq!(record.server_message.as_deref(), Some("Invalid API key"));
}

#[test]
fn odd_geometry_never_reaches_transport() {
    let transport = MockTransport::replying(200, "[]");
    let params = PolygonTimeseriesParams::new(
        vec![-121.4, 38.5, -121.3, 38.5, -121.3],
        date(2021, 1, 1),
        date(2021, 12, 31),
    );
    let err = client(&transport).polygon_timeseries(params).unwrap_err();

    assert!(matches!(err, Error::Validation(ValidationError::Geometry(_))), "{:?}", err);
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(transport.calls().is_empty());
}

#[test]
fn quota_null_fields_become_sentinel() {
    let transport = MockTransport::replying(
        200,
        r#"{"Tier":"Basic","Monthly Requests":500,"Cloud Project ID": null}"#,
    );
    let quota = client(&transport).account_quota().unwrap();

    let project = quota.get("Cloud Project ID").unwrap();
    assert_eq!(project.as_text(), Some("None"));
    assert_eq!(quota.get("Monthly Requests").and_then(|v| v.as_f64()), Some(500.0));
    assert!(quota.summary().contains("not linked"));

    let sent = &transport.calls()[0];
    assert_eq!(sent.url, "https://openet.test/account/status");
    assert!(sent.body.is_none());
}

#[test]
fn every_documented_status_is_classified() {
    let cases = [
        (401, ErrorKind::Unauthorized),
        (403, ErrorKind::Forbidden),
        (404, ErrorKind::NotFound),
        (406, ErrorKind::NotAcceptable),
        (422, ErrorKind::UnprocessableParams),
        (500, ErrorKind::ServerError),
        (418, ErrorKind::Unknown),
    ];
    for (status, kind) in cases {
        let transport = MockTransport::replying(status, "plain text failure");
        let err = client(&transport)
            .call(OperationId::FieldsTimeseries.descriptor(), scenario_a_params())
            .unwrap_err();
        assert_eq!(err.kind(), kind, "status {}", status);
        assert_eq!(
            err.record().and_then(|r| r.server_message.as_deref()),
            Some("plain text failure")
        );
    }
}

#[test]
fn transport_failure_is_passed_through_once() {
    let transport = MockTransport::failing(TransportError::new(TransportErrorKind::Timeout, "timed out"));
    let err = client(&transport).account_quota().unwrap_err();

    match err {
        Error::Transport(e) => assert_eq!(e.kind, TransportErrorKind::Timeout),
        other => panic!("expected transport error, got {:?}", other),
    }
    assert_eq!(transport.calls().len(), 1);
}

#[test]
fn missing_parameters_are_named() {
    let transport = MockTransport::replying(200, "[]");
    let params = RequestParameters::new().with("start_date", "2021-01-01");
    let err = client(&transport)
        .call(OperationId::FieldsTimeseries.descriptor(), params)
        .unwrap_err();

    match err {
        Error::Validation(ValidationError::MissingParams(names)) => {
            assert_eq!(names, vec!["field_ids".to_string(), "end_date".to_string()]);
        }
        other => panic!("expected missing params, got {:?}", other),
    }
    assert!(transport.calls().is_empty());
}

#[test]
fn blank_credential_is_a_validation_error() {
    let transport = MockTransport::replying(200, "{}");
    let err = Client::with_transport(BASE, "  ", transport.clone())
        .account_quota()
        .unwrap_err();

    assert!(matches!(err, Error::Validation(ValidationError::MissingParams(ref names)) if names == &["api_key"]));
    assert!(transport.calls().is_empty());
}

#[test]
fn date_parts_for_mid_march() {
    let transport = MockTransport::replying(
        200,
        json!([{"time": "2021-03-15T00:00:00", "feature_unique_id": "A1", "value_mm": 3.0}]).to_string(),
    );
    let params = scenario_a_params().with("units", "mm");
    let series = client(&transport)
        .call(OperationId::FieldsTimeseries.descriptor(), params)
        .unwrap()
        .into_rows()
        .unwrap();

    let row = &series.rows()[0];
    assert_eq!((row.year, row.month, row.julian_day), (2021, 3, 74));
    assert_eq!(row.value("et"), Some(3.0));
    assert_eq!(row.units, "mm");
}

#[test]
fn multipolygon_v2_posts_and_returns_url() {
    let url = "https://storage.googleapis.com/openet/exports/run-1.csv";
    let transport = MockTransport::replying(200, json!({"destination": url}).to_string());
    let params = MultipolygonTimeseriesParams::new("projects/me/assets/fields", date(2021, 1, 1), date(2021, 6, 30))
        .with_variables(["ET", "PR"]);

    assert_eq!(client(&transport).multipolygon_timeseries(params).unwrap(), url);

    let sent = &transport.calls()[0];
    assert_eq!(sent.method.as_str(), "POST");
    assert_eq!(sent.url, "https://openet.test/raster/timeseries/multipolygon");
    let body = sent.body.as_ref().unwrap();
    assert_eq!(body["asset_id"], json!("projects/me/assets/fields"));
    assert_eq!(body["variable"], json!(["ET", "PR"]));
    assert_eq!(body["file_format"], json!("CSV"));
}

#[test]
fn multipolygon_v1_uses_query_string() {
    let url = "https://storage.googleapis.com/openet/exports/run-2.csv";
    let transport = MockTransport::replying(200, url);
    let params = MultipolygonTimeseriesParams::new("projects/me/assets/fields", date(2021, 1, 1), date(2021, 6, 30))
        .with_version(ApiVersion::V1);

    assert_eq!(client(&transport).multipolygon_timeseries(params).unwrap(), url);

    let sent = &transport.calls()[0];
    assert_eq!(sent.method.as_str(), "GET");
    assert!(sent.body.is_none());
    assert_eq!(sent.query_value("asset_id"), Some("projects/me/assets/fields"));
    assert_eq!(sent.query_value("start_date"), Some("2021-01-01"));
    assert_eq!(sent.query_value("output_file_format"), Some("csv"));
    assert_eq!(sent.query_value("provisional"), Some("false"));
}

#[test]
fn multipolygon_server_error_mentions_sharing() {
    let transport = MockTransport::replying(500, r#"{"detail": "Internal Server Error"}"#);
    let params = MultipolygonTimeseriesParams::new("projects/me/assets/fields", date(2021, 1, 1), date(2021, 6, 30));
    let err = client(&transport).multipolygon_timeseries(params).unwrap_err();

    let record = err.record().unwrap();
    assert_eq!(record.kind, ErrorKind::ServerError);
    assert_eq!(record.hint, "asset may not be shared with the service account");
}

#[test]
fn download_follows_result_link() {
    let dir = tempfile::tempdir().unwrap();
    let transport = MockTransport::replying(200, "date,et\n2021-01-01,1.0\n");
    let target = dir.path().join("export.csv");

    let path = client(&transport)
        .download("https://storage.googleapis.com/openet/exports/run-1.csv", &target)
        .unwrap();

    assert_eq!(std::fs::read_to_string(path).unwrap(), "date,et\n2021-01-01,1.0\n");
    assert!(transport.calls()[0].header("Authorization").is_none());
}

#[test]
fn padded_values_match_what_was_validated() {
    let transport = MockTransport::replying(
        200,
        json!([
            {"time": "2021-01-01", "feature_unique_id": "0001", "variable": "ET", "value_mm": 25.4},
            {"time": "2021-01-01", "feature_unique_id": "0001", "variable": "PR", "value_mm": 10.0},
        ])
        .to_string(),
    );
    let params = scenario_a_params()
        .with("units", " in ")
        .with("variables", vec![" ET".to_string(), "PR".to_string()]);
    let series = client(&transport)
        .call(OperationId::FieldsTimeseries.descriptor(), params)
        .unwrap()
        .into_rows()
        .unwrap();

    let names: Vec<&str> = series.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["et", "pr"]);
    assert_eq!(series.units(), Units::Inches);
    let row = &series.rows()[0];
    assert!((row.value("et").unwrap() - 1.0).abs() < 1e-9);
    assert_eq!(row.value("pr"), Some(10.0));
    assert_eq!(row.units, "in");
    assert_eq!(row.model, "Ensemble");
}

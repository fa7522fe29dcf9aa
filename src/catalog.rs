//! Declarative description of every supported OpenET call.
//!
//! Adding an endpoint means adding one [`OperationDescriptor`] to [`CATALOG`];
//! the request builder and the normalizer are driven entirely by these tables.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationId {
    FieldsTimeseries,
    PolygonTimeseries,
    MultipolygonTimeseries,
    AccountQuota,
}

impl OperationId {
    pub fn descriptor(self) -> &'static OperationDescriptor {
        match self {
            OperationId::FieldsTimeseries => &FIELDS_TIMESERIES,
            OperationId::PolygonTimeseries => &POLYGON_TIMESERIES,
            OperationId::MultipolygonTimeseries => &MULTIPOLYGON_TIMESERIES,
            OperationId::AccountQuota => &ACCOUNT_QUOTA,
        }
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descriptor().name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful body looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// A JSON array of row objects (or a CSV table when `file_format = CSV`).
    JsonListOfObjects,
    /// A single flat JSON object.
    JsonObject,
    /// Only a link to a file produced server-side.
    CsvUrl,
}

/// Wire encoding generation, for endpoints that changed shape between API versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiVersion {
    /// Query-string GET.
    V1,
    /// JSON body POST.
    #[default]
    V2,
}

impl ApiVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1",
            ApiVersion::V2 => "v2",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    Text,
    Number,
    Bool,
    /// ISO `YYYY-MM-DD`.
    Date,
    TextList,
    /// Flat `[lon, lat, lon, lat, ...]` coordinate list.
    Geometry,
    /// One of a fixed set, compared case-insensitively.
    Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultValue {
    Text(&'static str),
    Bool(bool),
    TextList(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<DefaultValue>,
}

impl ParamSpec {
    const fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
        }
    }

    const fn optional(name: &'static str, kind: ParamKind, default: DefaultValue) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: Some(default),
        }
    }
}

/// How one wire key is produced from the merged parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WireField {
    /// The parameter as-is: lists become JSON arrays in bodies, comma-joined in queries.
    Value {
        key: &'static str,
        param: &'static str,
    },
    /// A scalar parameter sent as a one-element list.
    AsList {
        key: &'static str,
        param: &'static str,
    },
    /// Two date parameters sent as `[start, end]`.
    DateRange {
        key: &'static str,
        start: &'static str,
        end: &'static str,
    },
    /// A fixed value the endpoint requires.
    Const {
        key: &'static str,
        value: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WireEncoding {
    pub version: ApiVersion,
    pub method: HttpMethod,
    pub accept: &'static str,
    pub fields: &'static [WireField],
}

/// Output variable known to an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableSpec {
    pub name: &'static str,
    /// Whether the millimetre to inch conversion applies to this variable.
    pub convert_units: bool,
}

impl VariableSpec {
    /// Column name used in canonical rows.
    pub fn column(&self) -> String {
        self.name.to_lowercase()
    }
}

/// Where canonical row fields come from in an upstream row object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowSchema {
    pub date_keys: &'static [&'static str],
    pub entity_keys: &'static [&'static str],
    /// Used when rows carry no entity key.
    pub fixed_entity: Option<&'static str>,
    /// Keys holding a single value; the variable is then named by `variable_keys`
    /// or is the only one requested.
    pub value_keys: &'static [&'static str],
    pub variable_keys: &'static [&'static str],
    pub model_keys: &'static [&'static str],
    /// Parameter naming the requested variable(s).
    pub variable_param: &'static str,
    pub model_param: &'static str,
    pub units_param: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputSchema {
    Rows(RowSchema),
    /// Flat record; every listed field is always present in the output.
    Record { fields: &'static [&'static str] },
    /// Object keys that may hold the result link.
    Url { keys: &'static [&'static str] },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperationDescriptor {
    pub id: OperationId,
    pub name: &'static str,
    pub endpoint: &'static str,
    /// First entry is used unless a `version` parameter selects another.
    pub encodings: &'static [WireEncoding],
    pub params: &'static [ParamSpec],
    pub response_shape: ResponseShape,
    pub output_schema: OutputSchema,
    pub variables: &'static [VariableSpec],
    /// The server converts to the requested unit itself.
    pub units_applied_upstream: bool,
    pub server_error_hint: Option<&'static str>,
}

impl OperationDescriptor {
    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn required_params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.required)
    }

    pub fn variable(&self, name: &str) -> Option<&VariableSpec> {
        self.variables
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(name))
    }

    pub fn encoding(&self, version: Option<ApiVersion>) -> Option<&WireEncoding> {
        match version {
            Some(v) => self.encodings.iter().find(|e| e.version == v),
            None => self.encodings.first(),
        }
    }

    pub fn row_schema(&self) -> Option<&RowSchema> {
        match &self.output_schema {
            OutputSchema::Rows(schema) => Some(schema),
            _ => None,
        }
    }
}

pub const MODELS: &[&str] = &[
    "Ensemble", "eeMETRIC", "SSEBop", "SIMS", "PTJPL", "geeSEBAL", "DisALEXI",
];
pub const UNITS: &[&str] = &["mm", "in"];
pub const INTERVALS: &[&str] = &["daily", "monthly"];
pub const REDUCERS: &[&str] = &["mean", "median", "min", "max", "sum"];
pub const REFERENCE_ET: &[&str] = &["gridMET", "CIMIS"];
pub const FILE_FORMATS: &[&str] = &["JSON", "CSV"];
pub const VERSIONS: &[&str] = &["v1", "v2"];

const JSON: &str = "application/json";

const VARIABLES: &[VariableSpec] = &[
    VariableSpec {
        name: "ET",
        convert_units: true,
    },
    VariableSpec {
        name: "ETo",
        convert_units: false,
    },
    VariableSpec {
        name: "ETr",
        convert_units: false,
    },
    VariableSpec {
        name: "ETof",
        convert_units: false,
    },
    VariableSpec {
        name: "NDVI",
        convert_units: false,
    },
    VariableSpec {
        name: "PR",
        convert_units: false,
    },
];

const TIMESERIES_DATE_KEYS: &[&str] = &["time", "date", "start_date"];
const TIMESERIES_VALUE_KEYS: &[&str] = &["value_mm", "value"];
const TIMESERIES_VARIABLE_KEYS: &[&str] = &["variable", "collection"];
const TIMESERIES_MODEL_KEYS: &[&str] = &["model"];

pub static FIELDS_TIMESERIES: OperationDescriptor = OperationDescriptor {
    id: OperationId::FieldsTimeseries,
    name: "fields-timeseries",
    endpoint: "/geodatabase/timeseries",
    encodings: &[WireEncoding {
        version: ApiVersion::V2,
        method: HttpMethod::Post,
        accept: JSON,
        fields: &[
            WireField::Value {
                key: "field_ids",
                param: "field_ids",
            },
            WireField::AsList {
                key: "models",
                param: "model",
            },
            WireField::Value {
                key: "variables",
                param: "variables",
            },
            WireField::DateRange {
                key: "date_range",
                start: "start_date",
                end: "end_date",
            },
            WireField::Value {
                key: "interval",
                param: "interval",
            },
            WireField::Value {
                key: "file_format",
                param: "file_format",
            },
        ],
    }],
    params: &[
        ParamSpec::required("field_ids", ParamKind::TextList),
        ParamSpec::required("start_date", ParamKind::Date),
        ParamSpec::required("end_date", ParamKind::Date),
        ParamSpec::optional("model", ParamKind::Choice(MODELS), DefaultValue::Text("Ensemble")),
        ParamSpec::optional("variables", ParamKind::TextList, DefaultValue::TextList(&["ET"])),
        ParamSpec::optional("interval", ParamKind::Choice(INTERVALS), DefaultValue::Text("monthly")),
        ParamSpec::optional("units", ParamKind::Choice(UNITS), DefaultValue::Text("mm")),
        ParamSpec::optional(
            "file_format",
            ParamKind::Choice(FILE_FORMATS),
            DefaultValue::Text("JSON"),
        ),
    ],
    response_shape: ResponseShape::JsonListOfObjects,
    output_schema: OutputSchema::Rows(RowSchema {
        date_keys: TIMESERIES_DATE_KEYS,
        entity_keys: &["feature_unique_id", "feature_id", "field_id"],
        fixed_entity: None,
        value_keys: TIMESERIES_VALUE_KEYS,
        variable_keys: TIMESERIES_VARIABLE_KEYS,
        model_keys: TIMESERIES_MODEL_KEYS,
        variable_param: "variables",
        model_param: "model",
        units_param: "units",
    }),
    variables: VARIABLES,
    units_applied_upstream: false,
    server_error_hint: None,
};

pub static POLYGON_TIMESERIES: OperationDescriptor = OperationDescriptor {
    id: OperationId::PolygonTimeseries,
    name: "polygon-timeseries",
    endpoint: "/raster/timeseries/polygon",
    encodings: &[WireEncoding {
        version: ApiVersion::V2,
        method: HttpMethod::Post,
        accept: JSON,
        fields: &[
            WireField::DateRange {
                key: "date_range",
                start: "start_date",
                end: "end_date",
            },
            WireField::Value {
                key: "interval",
                param: "interval",
            },
            WireField::Value {
                key: "geometry",
                param: "geometry",
            },
            WireField::Value {
                key: "model",
                param: "model",
            },
            WireField::Value {
                key: "variable",
                param: "variable",
            },
            WireField::Value {
                key: "reference_et",
                param: "reference_et",
            },
            WireField::Value {
                key: "units",
                param: "units",
            },
            WireField::Value {
                key: "reducer",
                param: "reducer",
            },
            WireField::Const {
                key: "file_format",
                value: "JSON",
            },
        ],
    }],
    params: &[
        ParamSpec::required("geometry", ParamKind::Geometry),
        ParamSpec::required("start_date", ParamKind::Date),
        ParamSpec::required("end_date", ParamKind::Date),
        ParamSpec::optional("model", ParamKind::Choice(MODELS), DefaultValue::Text("Ensemble")),
        ParamSpec::optional("variable", ParamKind::Text, DefaultValue::Text("ET")),
        ParamSpec::optional(
            "reference_et",
            ParamKind::Choice(REFERENCE_ET),
            DefaultValue::Text("gridMET"),
        ),
        ParamSpec::optional("units", ParamKind::Choice(UNITS), DefaultValue::Text("mm")),
        ParamSpec::optional("reducer", ParamKind::Choice(REDUCERS), DefaultValue::Text("mean")),
        ParamSpec::optional("interval", ParamKind::Choice(INTERVALS), DefaultValue::Text("monthly")),
    ],
    response_shape: ResponseShape::JsonListOfObjects,
    output_schema: OutputSchema::Rows(RowSchema {
        date_keys: TIMESERIES_DATE_KEYS,
        entity_keys: &[],
        fixed_entity: Some("polygon"),
        value_keys: TIMESERIES_VALUE_KEYS,
        variable_keys: TIMESERIES_VARIABLE_KEYS,
        model_keys: TIMESERIES_MODEL_KEYS,
        variable_param: "variable",
        model_param: "model",
        units_param: "units",
    }),
    variables: VARIABLES,
    units_applied_upstream: true,
    server_error_hint: None,
};

pub static MULTIPOLYGON_TIMESERIES: OperationDescriptor = OperationDescriptor {
    id: OperationId::MultipolygonTimeseries,
    name: "multipolygon-timeseries",
    endpoint: "/raster/timeseries/multipolygon",
    encodings: &[
        WireEncoding {
            version: ApiVersion::V2,
            method: HttpMethod::Post,
            accept: JSON,
            fields: &[
                WireField::DateRange {
                    key: "date_range",
                    start: "start_date",
                    end: "end_date",
                },
                WireField::Value {
                    key: "interval",
                    param: "interval",
                },
                WireField::Value {
                    key: "asset_id",
                    param: "asset_id",
                },
                WireField::Value {
                    key: "attributes",
                    param: "attributes",
                },
                WireField::Value {
                    key: "model",
                    param: "model",
                },
                WireField::Value {
                    key: "variable",
                    param: "variables",
                },
                WireField::Value {
                    key: "reference_et",
                    param: "reference_et",
                },
                WireField::Value {
                    key: "units",
                    param: "units",
                },
                WireField::Value {
                    key: "reducer",
                    param: "reducer",
                },
                WireField::Const {
                    key: "file_format",
                    value: "CSV",
                },
            ],
        },
        WireEncoding {
            version: ApiVersion::V1,
            method: HttpMethod::Get,
            accept: JSON,
            fields: &[
                WireField::Value {
                    key: "start_date",
                    param: "start_date",
                },
                WireField::Value {
                    key: "end_date",
                    param: "end_date",
                },
                WireField::Value {
                    key: "model",
                    param: "model",
                },
                WireField::Value {
                    key: "variable",
                    param: "variables",
                },
                WireField::Value {
                    key: "asset_id",
                    param: "asset_id",
                },
                WireField::Value {
                    key: "attributes",
                    param: "attributes",
                },
                WireField::Value {
                    key: "reducer",
                    param: "reducer",
                },
                WireField::Value {
                    key: "ref_et_source",
                    param: "reference_et",
                },
                WireField::Value {
                    key: "units",
                    param: "units",
                },
                WireField::Value {
                    key: "interval",
                    param: "interval",
                },
                WireField::Value {
                    key: "provisional",
                    param: "provisional",
                },
                WireField::Const {
                    key: "output_file_format",
                    value: "csv",
                },
            ],
        },
    ],
    params: &[
        ParamSpec::required("asset_id", ParamKind::Text),
        ParamSpec::required("start_date", ParamKind::Date),
        ParamSpec::required("end_date", ParamKind::Date),
        ParamSpec::optional("model", ParamKind::Choice(MODELS), DefaultValue::Text("Ensemble")),
        ParamSpec::optional("variables", ParamKind::TextList, DefaultValue::TextList(&["ET"])),
        ParamSpec::optional("attributes", ParamKind::TextList, DefaultValue::TextList(&[])),
        ParamSpec::optional("reducer", ParamKind::Choice(REDUCERS), DefaultValue::Text("mean")),
        ParamSpec::optional(
            "reference_et",
            ParamKind::Choice(REFERENCE_ET),
            DefaultValue::Text("gridMET"),
        ),
        ParamSpec::optional("units", ParamKind::Choice(UNITS), DefaultValue::Text("mm")),
        ParamSpec::optional("interval", ParamKind::Choice(INTERVALS), DefaultValue::Text("monthly")),
        ParamSpec::optional("provisional", ParamKind::Bool, DefaultValue::Bool(false)),
        ParamSpec::optional("version", ParamKind::Choice(VERSIONS), DefaultValue::Text("v2")),
    ],
    response_shape: ResponseShape::CsvUrl,
    output_schema: OutputSchema::Url {
        keys: &["destination", "url", "file"],
    },
    variables: VARIABLES,
    units_applied_upstream: true,
    server_error_hint: Some("asset may not be shared with the service account"),
};

pub static ACCOUNT_QUOTA: OperationDescriptor = OperationDescriptor {
    id: OperationId::AccountQuota,
    name: "account-quota",
    endpoint: "/account/status",
    encodings: &[WireEncoding {
        version: ApiVersion::V2,
        method: HttpMethod::Get,
        accept: JSON,
        fields: &[],
    }],
    params: &[],
    response_shape: ResponseShape::JsonObject,
    output_schema: OutputSchema::Record {
        fields: &[
            "Tier",
            "Monthly Requests",
            "Max Field IDs",
            "Compute Units Used",
            "Max Acres",
            "Max Polygons",
            "Cloud Project ID",
        ],
    },
    variables: &[],
    units_applied_upstream: false,
    server_error_hint: None,
};

/// Every supported operation, in declaration order.
pub static CATALOG: [&OperationDescriptor; 4] = [
    &FIELDS_TIMESERIES,
    &POLYGON_TIMESERIES,
    &MULTIPOLYGON_TIMESERIES,
    &ACCOUNT_QUOTA,
];

pub fn find(name: &str) -> Option<&'static OperationDescriptor> {
    CATALOG.iter().copied().find(|d| d.name == name)
}

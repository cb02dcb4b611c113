//! Data source integration
//!
//! The engine never reads records itself: `Retrieve` nodes and property
//! navigation go through a [`DataProvider`]. [`JsonDataProvider`] keeps
//! FHIR-shaped JSON resources in memory and is what tests and embedders
//! without a store use.

use std::str::FromStr;
use std::sync::LazyLock;

use cqlpath_types::{
    CqlCode, CqlConcept, CqlDate, CqlDateTime, CqlList, CqlQuantity, CqlTime, CqlTuple, CqlValue,
};
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use crate::error::EvalResult;

/// Parameters of one retrieve (`[Condition: "Diabetes"]`)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RetrieveRequest {
    /// Resource type, e.g. `Condition`
    pub data_type: String,
    /// Property holding the codes to filter on; `code` when absent
    pub code_path: Option<String>,
    /// Code filter; `None` retrieves every record of the type
    pub codes: Option<Vec<CqlCode>>,
    /// Context the retrieve runs in, e.g. `Patient`
    pub context_type: Option<String>,
}

impl RetrieveRequest {
    pub fn new(data_type: impl Into<String>) -> Self {
        Self {
            data_type: data_type.into(),
            ..Self::default()
        }
    }

    pub fn with_codes(mut self, code_path: Option<String>, codes: Vec<CqlCode>) -> Self {
        self.code_path = code_path;
        self.codes = Some(codes);
        self
    }

    pub fn with_context(mut self, context_type: impl Into<String>) -> Self {
        self.context_type = Some(context_type.into());
        self
    }
}

/// Source of clinical records
pub trait DataProvider: Send + Sync {
    /// Records of the requested type matching the code filter
    fn retrieve(&self, request: &RetrieveRequest) -> EvalResult<Vec<CqlValue>>;

    /// Value of `path` on one record. Repeated elements come back as a list.
    fn navigate(&self, record: &CqlValue, path: &str) -> EvalResult<CqlValue> {
        Ok(navigate_value(record, path))
    }

    /// Subject of the current context (the patient), if the provider knows it
    fn current_context(&self) -> Option<CqlValue> {
        None
    }
}

/// Structural navigation over system values
pub fn navigate_value(record: &CqlValue, path: &str) -> CqlValue {
    match record {
        CqlValue::Tuple(tuple) => tuple.get(path).cloned().unwrap_or(CqlValue::Null),
        CqlValue::Interval(interval) => match path {
            "low" => interval.low().cloned().unwrap_or(CqlValue::Null),
            "high" => interval.high().cloned().unwrap_or(CqlValue::Null),
            "lowClosed" => CqlValue::Boolean(interval.low_closed),
            "highClosed" => CqlValue::Boolean(interval.high_closed),
            _ => CqlValue::Null,
        },
        CqlValue::Code(code) => match path {
            "code" => CqlValue::string(code.code.clone()),
            "system" => CqlValue::string(code.system.clone()),
            "version" => code.version.clone().map_or(CqlValue::Null, CqlValue::String),
            "display" => code.display.clone().map_or(CqlValue::Null, CqlValue::String),
            _ => CqlValue::Null,
        },
        CqlValue::Concept(concept) => match path {
            "codes" | "coding" => CqlValue::List(
                concept.codes.iter().cloned().map(CqlValue::Code).collect(),
            ),
            "display" | "text" => concept.display.clone().map_or(CqlValue::Null, CqlValue::String),
            _ => CqlValue::Null,
        },
        CqlValue::Quantity(quantity) => match path {
            "value" => CqlValue::Decimal(quantity.value),
            "unit" | "code" => CqlValue::string(quantity.unit.clone()),
            _ => CqlValue::Null,
        },
        CqlValue::Ratio(ratio) => match path {
            "numerator" => CqlValue::Quantity(ratio.numerator.clone()),
            "denominator" => CqlValue::Quantity(ratio.denominator.clone()),
            _ => CqlValue::Null,
        },
        CqlValue::List(list) => {
            let elements: Vec<CqlValue> = list
                .iter()
                .flat_map(|e| navigate_value(e, path).into_elements())
                .collect();
            CqlValue::List(CqlList::from_elements(elements))
        }
        _ => CqlValue::Null,
    }
}

/// Every code carried by a value (Code, Concept or a list of either)
pub fn extract_codes(value: &CqlValue) -> Vec<CqlCode> {
    match value {
        CqlValue::Code(code) => vec![code.clone()],
        CqlValue::Concept(concept) => concept.codes.to_vec(),
        CqlValue::List(list) => list.iter().flat_map(extract_codes).collect(),
        _ => vec![],
    }
}

// ============================================================================
// JSON provider
// ============================================================================

static DATE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}(-\d{2})?$").ok());
static DATETIME_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}(:\d{2})?").ok());
static TIME_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\d{2}:\d{2}(:\d{2}(\.\d+)?)?$").ok());

fn matches(pattern: &LazyLock<Option<Regex>>, s: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(s))
}

/// In-memory provider over FHIR-shaped JSON resources
#[derive(Debug, Clone, Default)]
pub struct JsonDataProvider {
    resources: Vec<CqlValue>,
    context: Option<CqlValue>,
}

impl JsonDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider over a set of resources
    pub fn with_resources(resources: impl IntoIterator<Item = JsonValue>) -> Self {
        let mut provider = Self::new();
        for resource in resources {
            provider.add_resource(&resource);
        }
        provider
    }

    /// Provider over the entries of a FHIR Bundle
    pub fn from_bundle(bundle: &JsonValue) -> Self {
        let entries = bundle
            .get("entry")
            .and_then(JsonValue::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.get("resource").cloned())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Self::with_resources(entries)
    }

    pub fn add_resource(&mut self, resource: &JsonValue) {
        self.resources.push(json_to_cql(resource));
    }

    /// Set the context subject (usually the Patient resource)
    pub fn with_context(mut self, subject: &JsonValue) -> Self {
        self.context = Some(json_to_cql(subject));
        self
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl DataProvider for JsonDataProvider {
    fn retrieve(&self, request: &RetrieveRequest) -> EvalResult<Vec<CqlValue>> {
        let code_path = request.code_path.as_deref().unwrap_or("code");
        let records = self
            .resources
            .iter()
            .filter(|r| resource_type(r) == Some(request.data_type.as_str()))
            .filter(|r| match &request.codes {
                None => true,
                Some(wanted) => extract_codes(&navigate_value(r, code_path))
                    .iter()
                    .any(|code| wanted.iter().any(|w| w.is_equivalent(code))),
            })
            .cloned()
            .collect();
        Ok(records)
    }

    fn current_context(&self) -> Option<CqlValue> {
        self.context.clone()
    }
}

fn resource_type(record: &CqlValue) -> Option<&str> {
    record
        .as_tuple()
        .and_then(|t| t.get("resourceType"))
        .and_then(CqlValue::as_string)
}

/// Convert JSON into system values. Objects shaped like a Quantity, Coding
/// or CodeableConcept become those types; other objects become tuples.
pub fn json_to_cql(value: &JsonValue) -> CqlValue {
    match value {
        JsonValue::Null => CqlValue::Null,
        JsonValue::Bool(b) => CqlValue::Boolean(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).map_or(CqlValue::Long(i), CqlValue::Integer)
            } else {
                Decimal::from_str(&n.to_string())
                    .or_else(|_| Decimal::from_scientific(&n.to_string()))
                    .map_or(CqlValue::Null, CqlValue::Decimal)
            }
        }
        JsonValue::String(s) => json_string(s),
        JsonValue::Array(items) => {
            CqlValue::List(CqlList::from_elements(items.iter().map(json_to_cql).collect()))
        }
        JsonValue::Object(obj) => {
            if let Some(quantity) = json_quantity(obj) {
                return CqlValue::Quantity(quantity);
            }
            if let Some(code) = json_coding(obj) {
                return CqlValue::Code(code);
            }
            if let Some(JsonValue::Array(codings)) = obj.get("coding") {
                let codes = codings
                    .iter()
                    .filter_map(JsonValue::as_object)
                    .filter_map(json_coding);
                let display = obj.get("text").and_then(JsonValue::as_str).map(str::to_string);
                return CqlValue::Concept(CqlConcept::new(codes, display));
            }
            CqlValue::Tuple(CqlTuple::from_elements(
                obj.iter().map(|(k, v)| (k.clone(), json_to_cql(v))),
            ))
        }
    }
}

fn json_string(s: &str) -> CqlValue {
    if matches(&DATE_PATTERN, s) {
        if let Some(date) = CqlDate::parse(s) {
            return CqlValue::Date(date);
        }
    }
    if matches(&DATETIME_PATTERN, s) {
        if let Some(datetime) = CqlDateTime::parse(s) {
            return CqlValue::DateTime(datetime);
        }
    }
    if matches(&TIME_PATTERN, s) {
        if let Some(time) = CqlTime::parse(s) {
            return CqlValue::Time(time);
        }
    }
    CqlValue::string(s)
}

fn json_quantity(obj: &serde_json::Map<String, JsonValue>) -> Option<CqlQuantity> {
    let JsonValue::Number(n) = obj.get("value")? else {
        return None;
    };
    let unit = obj
        .get("code")
        .or_else(|| obj.get("unit"))
        .and_then(JsonValue::as_str)?;
    let value = Decimal::from_str(&n.to_string()).ok()?;
    Some(CqlQuantity::new(value, unit))
}

fn json_coding(obj: &serde_json::Map<String, JsonValue>) -> Option<CqlCode> {
    let code = obj.get("code").and_then(JsonValue::as_str)?;
    let system = obj.get("system").and_then(JsonValue::as_str)?;
    let mut result = CqlCode::new(code, system);
    if let Some(display) = obj.get("display").and_then(JsonValue::as_str) {
        result = result.with_display(display);
    }
    if let Some(version) = obj.get("version").and_then(JsonValue::as_str) {
        result = result.with_version(version);
    }
    Some(result)
}

/// Best-effort extraction over the upstream quote payload.
///
/// The upstream schema is not stable: field names vary by deployment and
/// values may sit at the top level or one level down under `data`. Every
/// function here is total. Nothing panics and an absent value yields a
/// default, never an error. Located values are passed through as the
/// upstream sent them.
use crate::models::{ValidityDates, VehicleInfo};
use chrono::{DateTime, Datelike, Days, SecondsFormat, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Decimal prefix after optional leading whitespace, exponent included.
static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?")
        .expect("leading number pattern is valid")
});

/// Price candidates, most specific first. The first hit wins.
pub const PRICE_FIELDS: &[&str] = &[
    "valor",
    "precio",
    "prima",
    "precioTotal",
    "total",
    "costo",
    "valorTotal",
    "primaNeta",
    "valorPrima",
    "valorSOAT",
    "costoSOAT",
    "primaSOAT",
    "montoTotal",
];

pub const VEHICLE_TYPE_FIELDS: &[&str] = &["tipoVehiculo", "claseVehiculo", "tipo", "clase"];
pub const BRAND_FIELDS: &[&str] = &["marca", "marcaVehiculo"];
pub const MODEL_FIELDS: &[&str] = &["modelo", "modeloVehiculo"];
pub const DISPLACEMENT_FIELDS: &[&str] = &["cilindraje", "cilindrajeVehiculo"];
pub const START_DATE_FIELDS: &[&str] = &["inicioVigencia", "fechaInicio", "vigenciaDesde"];
pub const END_DATE_FIELDS: &[&str] = &["finVigencia", "fechaFin", "vigenciaHasta"];
pub const PAYER_NAME_FIELDS: &[&str] = &["nombreTomador", "nombre"];

pub const DEFAULT_VEHICLE_TYPE: &str = "AUTOMOVIL";
pub const NOT_AVAILABLE: &str = "N/A";

/// Returns the first positive finite price among [`PRICE_FIELDS`], or `0`.
///
/// Each field is checked at the top level and then under `data` before
/// moving on to the next field.
pub fn extract_price(payload: &Value) -> f64 {
    let nested = payload.get("data");

    for field in PRICE_FIELDS {
        if let Some(value) = payload.get(*field).and_then(parse_price) {
            tracing::debug!("Price found in field '{}': {}", field, value);
            return value;
        }
        if let Some(value) = nested.and_then(|d| d.get(*field)).and_then(parse_price) {
            tracing::debug!("Price found in field 'data.{}': {}", field, value);
            return value;
        }
    }

    tracing::warn!("No valid price found in upstream payload");
    0.0
}

/// Locates vehicle attributes, falling back to the documented sentinels.
pub fn extract_vehicle_info(payload: &Value) -> VehicleInfo {
    VehicleInfo {
        vehicle_type: lookup_or(payload, VEHICLE_TYPE_FIELDS, DEFAULT_VEHICLE_TYPE),
        brand: lookup_or(payload, BRAND_FIELDS, NOT_AVAILABLE),
        model: lookup_or(payload, MODEL_FIELDS, NOT_AVAILABLE),
        displacement: lookup_or(payload, DISPLACEMENT_FIELDS, NOT_AVAILABLE),
    }
}

/// Locates the validity window; missing ends are synthesized from now.
pub fn extract_dates(payload: &Value) -> ValidityDates {
    extract_dates_at(payload, Utc::now())
}

/// Same as [`extract_dates`] with an explicit reference instant.
pub fn extract_dates_at(payload: &Value, now: DateTime<Utc>) -> ValidityDates {
    ValidityDates {
        start: lookup_value(payload, START_DATE_FIELDS)
            .unwrap_or_else(|| Value::String(to_iso(now))),
        end: lookup_value(payload, END_DATE_FIELDS)
            .unwrap_or_else(|| Value::String(to_iso(one_year_after(now)))),
    }
}

/// Same month, day and time one year later. Feb 29 rolls over to Mar 1.
pub fn one_year_after(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant
        .with_year(instant.year() + 1)
        .or_else(|| {
            instant
                .checked_add_days(Days::new(1))
                .and_then(|next| next.with_year(next.year() + 1))
        })
        .unwrap_or(instant)
}

/// Payer name reported by the upstream, if any.
pub fn extract_payer_name(payload: &Value) -> Option<Value> {
    lookup_value(payload, PAYER_NAME_FIELDS)
}

/// Top-level keys of the payload, for diagnostics.
pub fn available_fields(payload: &Value) -> Vec<String> {
    payload
        .as_object()
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default()
}

/// Wire name of the payload's JSON type, as the front-end reports it.
pub fn response_type(payload: &Value) -> &'static str {
    match payload {
        Value::Null | Value::Array(_) | Value::Object(_) => "object",
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "boolean",
    }
}

/// First present alias, searched at the top level and then under `data`.
pub fn lookup_value(payload: &Value, aliases: &[&str]) -> Option<Value> {
    let found = aliases
        .iter()
        .find_map(|f| payload.get(*f).filter(|v| is_present(v)))
        .or_else(|| {
            let nested = payload.get("data")?;
            aliases
                .iter()
                .find_map(|f| nested.get(*f).filter(|v| is_present(v)))
        });
    found.cloned()
}

fn lookup_or(payload: &Value, aliases: &[&str], default: &str) -> Value {
    lookup_value(payload, aliases).unwrap_or_else(|| Value::String(default.to_string()))
}

/// Empty strings, zero, `false` and null count as absent. Objects and
/// arrays are present even when empty.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn parse_price(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_leading_float(s),
        _ => None,
    }?;
    (parsed.is_finite() && parsed > 0.0).then_some(parsed)
}

/// Parses the longest decimal prefix of `raw`, so `"150000 COP"` yields
/// `150000` and `"$150000"` yields nothing.
fn parse_leading_float(raw: &str) -> Option<f64> {
    let matched = LEADING_NUMBER.find(raw)?;
    matched.as_str().trim_start().parse().ok()
}

/// RFC 3339 with millisecond precision and a `Z` suffix.
pub fn to_iso(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

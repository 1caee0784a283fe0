/// Unit tests for the response normalizer
/// Tests price priority, vehicle sentinels and validity-date synthesis
use chrono::{DateTime, Datelike, Utc};
use serde_json::json;
use soat_quote_gateway::normalizer::{
    available_fields, extract_dates, extract_dates_at, extract_price, extract_vehicle_info,
    PRICE_FIELDS,
};

#[cfg(test)]
mod price_tests {
    use super::*;

    #[test]
    fn test_every_declared_field_is_recognized() {
        for field in PRICE_FIELDS {
            let mut payload = serde_json::Map::new();
            payload.insert(field.to_string(), json!(123456));
            let payload = serde_json::Value::Object(payload);
            assert_eq!(extract_price(&payload), 123456.0, "field {}", field);
        }
    }

    #[test]
    fn test_earlier_field_wins() {
        let payload = json!({"montoTotal": 1, "prima": 2, "valor": 3});
        assert_eq!(extract_price(&payload), 3.0);

        let payload = json!({"total": 500, "precioTotal": 700});
        assert_eq!(extract_price(&payload), 700.0);
    }

    #[test]
    fn test_invalid_higher_priority_value_is_skipped() {
        let payload = json!({"valor": "N/A", "precio": 0, "prima": "321000"});
        assert_eq!(extract_price(&payload), 321000.0);
    }

    #[test]
    fn test_nested_under_data() {
        let payload = json!({"success": true, "data": {"valorSOAT": "612400.00"}});
        assert_eq!(extract_price(&payload), 612400.0);
    }

    #[test]
    fn test_no_price_returns_zero() {
        assert_eq!(extract_price(&json!({})), 0.0);
        assert_eq!(extract_price(&json!({"mensaje": "sin tarifa"})), 0.0);
        assert_eq!(extract_price(&json!(null)), 0.0);
        assert_eq!(extract_price(&json!({"data": "valor"})), 0.0);
    }
}

#[cfg(test)]
mod vehicle_tests {
    use super::*;

    #[test]
    fn test_sentinels_when_missing() {
        let info = extract_vehicle_info(&json!({"valor": 10}));
        assert_eq!(info.vehicle_type, "AUTOMOVIL");
        assert_eq!(info.brand, "N/A");
        assert_eq!(info.model, "N/A");
        assert_eq!(info.displacement, "N/A");
    }

    #[test]
    fn test_alias_spellings() {
        let info = extract_vehicle_info(&json!({
            "claseVehiculo": "CAMPERO",
            "marcaVehiculo": "TOYOTA",
            "modeloVehiculo": "2018",
            "cilindrajeVehiculo": "2700"
        }));
        assert_eq!(info.vehicle_type, "CAMPERO");
        assert_eq!(info.brand, "TOYOTA");
        assert_eq!(info.model, "2018");
        assert_eq!(info.displacement, "2700");
    }

    #[test]
    fn test_type_alias_priority() {
        let info = extract_vehicle_info(&json!({"clase": "MOTO", "tipo": "BUS"}));
        assert_eq!(info.vehicle_type, "BUS");
    }

    #[test]
    fn test_numeric_and_object_values_pass_through() {
        let info = extract_vehicle_info(&json!({
            "modelo": 2021,
            "cilindraje": 1600,
            "marca": {"nombre": "MAZDA"}
        }));
        assert_eq!(info.model, json!(2021));
        assert!(info.displacement.is_number());
        assert_eq!(info.displacement.as_u64(), Some(1600));
        assert_eq!(info.brand, json!({"nombre": "MAZDA"}));
    }

    #[test]
    fn test_empty_values_fall_back() {
        let info = extract_vehicle_info(&json!({"tipoVehiculo": "", "marca": null, "cilindraje": 0}));
        assert_eq!(info.vehicle_type, "AUTOMOVIL");
        assert_eq!(info.brand, "N/A");
        assert_eq!(info.displacement, "N/A");
    }
}

#[cfg(test)]
mod date_tests {
    use super::*;

    fn parse(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_upstream_dates_are_kept() {
        let dates = extract_dates(&json!({"fechaInicio": "2025-03-01", "vigenciaHasta": "2026-03-01"}));
        assert_eq!(dates.start, "2025-03-01");
        assert_eq!(dates.end, "2026-03-01");
    }

    #[test]
    fn test_missing_dates_span_one_calendar_year() {
        let dates = extract_dates(&json!({}));
        let start = parse(dates.start.as_str().unwrap());
        let end = parse(dates.end.as_str().unwrap());
        assert_eq!(end.year(), start.year() + 1);
        assert_eq!(end.time(), start.time());
    }

    #[test]
    fn test_leap_day_rolls_over_to_march_first() {
        let now = parse("2024-02-29T12:00:00.000Z");
        let dates = extract_dates_at(&json!({}), now);
        assert_eq!(dates.start, "2024-02-29T12:00:00.000Z");
        assert_eq!(dates.end, "2025-03-01T12:00:00.000Z");
    }

    #[test]
    fn test_numeric_upstream_date_is_kept() {
        let dates = extract_dates(&json!({"vigenciaDesde": 20250301}));
        assert_eq!(dates.start, json!(20250301));
    }

    #[test]
    fn test_only_end_missing() {
        let now = parse("2025-06-15T08:30:00.000Z");
        let dates = extract_dates_at(&json!({"inicioVigencia": "2025-06-20"}), now);
        assert_eq!(dates.start, "2025-06-20");
        assert_eq!(dates.end, "2026-06-15T08:30:00.000Z");
    }
}

#[test]
fn test_available_fields_lists_top_level_keys() {
    let mut fields = available_fields(&json!({"valor": 1, "data": {"x": 2}}));
    fields.sort();
    assert_eq!(fields, vec!["data", "valor"]);
    assert!(available_fields(&json!([1])).is_empty());
}

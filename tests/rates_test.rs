use chrono::NaiveDate;
use pcrm_import::rates::{
    load_rate_table, resolve_booking_rate, resolve_preview, BookingRateRequest, DayType, FallbackPolicy,
    PreviewRequest, RateCategory,
};
use rust_decimal::Decimal;
use std::fs;
use std::str::FromStr;
use tempfile::TempDir;

const RATES_JSON: &str = r#"[
  {"company_id": "acme", "driver_class": "C+E", "rate_category": "days", "charge_rate": "21.50", "pay_rate": "16.25"},
  {"company_id": "acme", "driver_class": "C+E", "rate_category": "nights", "charge_rate": "24.00", "pay_rate": "18.00"},
  {"company_id": "acme", "driver_class": "C+E", "rate_category": "saturday", "charge_rate": "27.10", "pay_rate": "20.00"},
  {"company_id": "acme", "driver_class": "7.5T", "rate_category": "days", "charge_rate": "17.00", "pay_rate": "13.00"},
  {"customer_id": "cust-9", "driver_class": "C+E", "rate_category": "saturday", "charge_rate": "30", "pay_rate": "21"}
]"#;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn table() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rates.json");
    fs::write(&path, RATES_JSON).unwrap();
    (dir, path)
}

#[test]
fn test_preview_from_json_table() {
    let (_dir, path) = table();
    let rates = load_rate_table(&path).unwrap();
    assert_eq!(rates.len(), 5);

    // Friday to Sunday; no Sunday rate configured for C+E
    let request = PreviewRequest {
        start_date: Some(date("2024-06-07")),
        end_date: Some(date("2024-06-09")),
        driver_class: Some("C+E".to_string()),
        is_night_shift: false,
    };
    let preview = resolve_preview(&request, &rates, FallbackPolicy::WeekdayFallback).unwrap();

    let labels: Vec<(&str, &str)> = preview
        .days
        .iter()
        .map(|d| (d.day_name.as_str(), d.rate_name.as_str()))
        .collect();
    assert_eq!(
        labels,
        vec![
            ("Friday", "Days Rate"),
            ("Saturday", "Saturday Rate"),
            ("Sunday", "Days Rate (fallback)")
        ]
    );
    assert_eq!(preview.total_charge_rate, dec("70.10"));
    assert_eq!(preview.total_pay_rate, dec("52.50"));
    assert_eq!(preview.total_margin, dec("17.60"));
    assert_eq!(preview.total_days, 3);

    assert!(resolve_preview(&request, &rates, FallbackPolicy::Strict).is_none());
}

#[test]
fn test_preview_json_shape() {
    let (_dir, path) = table();
    let rates = load_rate_table(&path).unwrap();
    let request = PreviewRequest {
        start_date: Some(date("2024-06-10")),
        end_date: Some(date("2024-06-10")),
        driver_class: Some("7.5T".to_string()),
        is_night_shift: false,
    };
    let preview = resolve_preview(&request, &rates, FallbackPolicy::WeekdayFallback).unwrap();
    let value = serde_json::to_value(&preview).unwrap();

    assert_eq!(value["days"][0]["date"], "2024-06-10");
    assert_eq!(value["days"][0]["day_name"], "Monday");
    assert_eq!(value["days"][0]["margin"], "4.00");
    assert_eq!(value["total_days"], 1);
}

#[test]
fn test_booking_rate_is_customer_scoped() {
    let (_dir, path) = table();
    let rates = load_rate_table(&path).unwrap();
    let mut request = BookingRateRequest {
        customer_id: "cust-9".to_string(),
        driver_class: "C+E".to_string(),
        is_night_shift: false,
        day_type: DayType::Saturday,
        date: Some(date("2024-06-08")),
    };

    let rate = resolve_booking_rate(&request, &rates).unwrap();
    assert_eq!(rate.rate_category, RateCategory::Saturday);
    assert_eq!(rate.margin, dec("9"));

    // Company-wide weekday rates are not a substitute for a customer rate
    request.day_type = DayType::Weekday;
    assert!(resolve_booking_rate(&request, &rates).is_none());
}

#[test]
fn test_yaml_table() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rates.yaml");
    fs::write(
        &path,
        "- driver_class: C\n  rate_category: nights\n  charge_rate: 19.5\n  pay_rate: 14\n  valid_to: 2023-12-31\n",
    )
    .unwrap();
    let rates = load_rate_table(&path).unwrap();
    assert_eq!(rates[0].valid_to, Some(date("2023-12-31")));

    let request = PreviewRequest {
        start_date: Some(date("2024-01-01")),
        end_date: Some(date("2024-01-01")),
        driver_class: Some("C".to_string()),
        is_night_shift: true,
    };
    // Rate expired before the booking
    assert!(resolve_preview(&request, &rates, FallbackPolicy::WeekdayFallback).is_none());
}

#[test]
fn test_invalid_table_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("rates.json");
    fs::write(&path, "{\"not\": \"a list\"}").unwrap();
    assert!(load_rate_table(&path).is_err());
}

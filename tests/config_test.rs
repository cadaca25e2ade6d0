use price_toggle::utils::validation::Validate;
use price_toggle::{parse_document, AppConfig, ConversionEngine, ConversionRate, PriceToggleError};
use price_toggle::core::ledger::PriceLedger;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_config_file_drives_conversion() {
    std::env::set_var("PRICE_TOGGLE_TEST_ENDPOINT", "https://rates.example.com/eur.json");
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[currency]
source_code = "EUR"
target_code = "GBP"
target_symbol = "£"
fallback_rate = 0.85

[selectors]
price = [".amount"]

[render]
show_original = false

[rates]
endpoint = "${{PRICE_TOGGLE_TEST_ENDPOINT}}"
refresh_interval_minutes = 30
"#
    )
    .unwrap();

    let config = AppConfig::from_file(file.path()).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.rates.endpoint, "https://rates.example.com/eur.json");
    assert_eq!(config.refresh_interval(), chrono::Duration::minutes(30));
    // untouched sections keep their defaults
    assert_eq!(config.extraction.ancestor_depth, 3);
    assert!(config.render.tooltip);

    let mut doc = parse_document(r#"<body><b class="amount">10 EUR</b><b class="price">10 EUR</b></body>"#);
    let body = doc.body();
    let mut ledger = PriceLedger::new();
    let engine = ConversionEngine::new(&config).unwrap();
    let report = engine.convert(&mut doc, &mut ledger, body, ConversionRate::new(0.85).unwrap());

    assert_eq!(report.converted, 1);
    assert_eq!(doc.inner_text(ledger.nodes()[0]), "£8.50 GBP");
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = AppConfig::from_toml_str(
        r#"
[selectors]
price = [".price >"]
"#,
    )
    .unwrap();
    assert!(matches!(config.validate(), Err(PriceToggleError::SelectorError { .. })));

    let config = AppConfig::from_toml_str(
        r#"
[rates]
endpoint = "ftp://rates.example.com"
"#,
    )
    .unwrap();
    assert!(config.validate().is_err());

    assert!(AppConfig::from_toml_str("[currency\nsource_code = 1").is_err());
}

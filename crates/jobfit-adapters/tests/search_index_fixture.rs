use jobfit_adapters::{normalize_hits, ValidationError};
use serde_json::Value as JsonValue;

fn load_fixture_hits() -> Vec<JsonValue> {
    let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
    let raw = std::fs::read_to_string(root.join("fixtures/search-index/page-0.json"))
        .expect("fixture readable");
    let page: JsonValue = serde_json::from_str(&raw).expect("fixture is json");
    page["hits"].as_array().cloned().expect("hits array")
}

#[test]
fn fixture_page_normalizes_with_one_rejection() {
    let hits = load_fixture_hits();
    assert_eq!(hits.len(), 3);

    let outcome = normalize_hits(&hits);
    assert_eq!(outcome.listings.len(), 2);
    assert_eq!(outcome.duplicates, 0);
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].position, 2);
    assert_eq!(outcome.rejected[0].id.as_deref(), Some("c3d4e5f6-no-company"));
    assert_eq!(
        outcome.rejected[0].error,
        ValidationError::MissingField("company.name")
    );
}

#[test]
fn fixture_listings_carry_plain_text_and_location() {
    let outcome = normalize_hits(&load_fixture_hits());

    let backend = &outcome.listings[0];
    assert_eq!(backend.company, "Kopi Kenangan");
    assert_eq!(backend.location.to_string(), "Jakarta Selatan, Indonesia");
    assert!(!backend.description.contains('<'));
    assert!(backend.description.contains("backend engineer"));
    assert!(backend.description.contains("Go or Rust\nPostgreSQL"));
    assert!(backend.salary.disclosed().is_some());
    assert_eq!(
        backend.taxonomies.iter().cloned().collect::<Vec<_>>(),
        vec!["backend".to_string(), "engineering".to_string()]
    );

    let analyst = &outcome.listings[1];
    assert!(analyst.location.is_remote());
    assert!(analyst.salary.disclosed().is_none());
    assert_eq!(analyst.published_at.map(|t| t.timestamp()), Some(1_717_372_800));
    assert!(analyst.starts_featuring_at.is_some());
    assert!(analyst.taxonomies.is_empty());
    assert_eq!(analyst.suitability, None);
}

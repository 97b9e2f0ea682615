use seogen::data::{storage_key, CityCatalog, SortColumn};
use seogen::errors::BatchError;
use seogen::storage::{load_options, read_json, to_json_pretty, RecordStore};
use seogen::types::{CityRecords, ContentRecord, MissingReport, OptionEntry};
use seogen_test_utils::write_cities_csv;
use serde_json::json;
use tempfile::tempdir;

#[test]
fn test_catalog_is_sorted_and_sliced() {
    let dir = tempdir().unwrap();
    let path = write_cities_csv(
        dir.path(),
        &[("Rome", "Italy"), ("Buenos Aires", "Argentina"), ("Paris", "France")],
    )
    .unwrap();

    let catalog = CityCatalog::from_path(&path).unwrap().sorted_by(SortColumn::City);
    let cities: Vec<_> = catalog.rows().iter().map(|r| r.city.as_str()).collect();
    assert_eq!(cities, vec!["Buenos Aires", "Paris", "Rome"]);
    assert_eq!(catalog.city_id("Paris"), Some(3));
    assert_eq!(catalog.city_id("Lisbon"), None);

    let sliced = catalog.slice(Some(1), Some(10));
    assert_eq!(sliced.len(), 2);
    assert_eq!(sliced.rows()[0].city, "Paris");
}

#[test]
fn test_catalog_sorts_by_country_when_asked() {
    let dir = tempdir().unwrap();
    let path = write_cities_csv(
        dir.path(),
        &[("Rome", "Italy"), ("Buenos Aires", "Argentina"), ("Paris", "France")],
    )
    .unwrap();
    let column: SortColumn = "Country".parse().unwrap();

    let catalog = CityCatalog::from_path(&path).unwrap().sorted_by(column);

    let countries: Vec<_> = catalog.rows().iter().map(|r| r.country.as_str()).collect();
    assert_eq!(countries, vec!["Argentina", "France", "Italy"]);
    assert!("population".parse::<SortColumn>().is_err());
}

#[test]
fn test_catalog_without_ids_and_with_padding() {
    let csv = "city , country\n Saint-Malo , France \nNew York,USA\n";
    let catalog = CityCatalog::from_reader(csv.as_bytes()).unwrap();

    assert_eq!(catalog.rows()[0].city, "Saint-Malo");
    assert_eq!(catalog.rows()[0].id_city, None);
    assert_eq!(
        catalog.only(&["New York".to_string()]).rows()[0].country,
        "USA"
    );
}

#[test]
fn test_storage_key_replaces_spaces_and_hyphens() {
    assert_eq!(storage_key("Saint-Malo"), "Saint_Malo");
    assert_eq!(storage_key("New York"), "New_York");
    assert_eq!(storage_key("Paris"), "Paris");
}

#[test]
fn test_options_load_in_file_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("Paris.json");
    std::fs::write(
        &path,
        r#"{"2": "Chez Janou", "1": {"name": "Le Petit Bistro", "description": "Cosy."}}"#,
    )
    .unwrap();

    let options = load_options(&path).unwrap();

    assert_eq!(options.keys().collect::<Vec<_>>(), vec!["2", "1"]);
    assert_eq!(options["2"], OptionEntry::Name("Chez Janou".to_string()));
    assert_eq!(options["1"].description(), Some("Cosy."));
    assert!(matches!(
        load_options(&dir.path().join("Rome.json")),
        Err(BatchError::NotFound(_))
    ));
}

#[test]
fn test_record_store_writes_indented_documents() {
    let dir = tempdir().unwrap();
    let store = RecordStore::new(dir.path().join("cheap_eats"));
    let record = ContentRecord {
        name: "Café de Flore".to_string(),
        location: "Paris, France".to_string(),
        meta: "m".to_string(),
        keywords: vec!["café".to_string()],
        title: "t".to_string(),
        text: "x".to_string(),
        links: vec![],
        images: vec![],
    };
    let records = CityRecords::from([("1".to_string(), record.clone())]);

    let path = store.write_records("Paris", &records).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("{\n    \"1\": {\n        \"name\": \"Café de Flore\""));
    let read_back = store.read_records("Paris").unwrap().unwrap();
    assert_eq!(read_back["1"], record);
    assert!(store.read_records("Rome").unwrap().is_none());
}

#[test]
fn test_missing_report_is_written_next_to_documents() {
    let dir = tempdir().unwrap();
    let store = RecordStore::new(dir.path());
    let mut report = MissingReport::default();
    report.items.insert("Paris".to_string(), vec!["3".to_string()]);
    report.cities.push("Rome".to_string());

    let path = store.write_report(&report).unwrap();

    assert_eq!(path.file_name().unwrap(), "missing.json");
    let read_back: MissingReport = read_json(&path).unwrap().unwrap();
    assert_eq!(read_back, report);
}

#[test]
fn test_pretty_json_uses_four_spaces() {
    let bytes = to_json_pretty(&json!({"a": [1]})).unwrap();
    assert_eq!(String::from_utf8(bytes).unwrap(), "{\n    \"a\": [\n        1\n    ]\n}");
}

//! # Batch Driver
//!
//! Runs a category over a city catalog. Cities are dealt round-robin to the
//! workers (one per credential); each worker handles its cities one after the
//! other while the workers themselves run concurrently as tokio tasks.
//!
//! Item-level categories (cheap eats, attractions) expand each city into the
//! items of its option list. City-level categories (descriptions, transport)
//! send a single prompt per city and store the answer as the city's document.

use crate::data::{storage_key, CityCatalog};
use crate::errors::{BatchError, ItemError};
use crate::normalize::NormalizedPayload;
use crate::pipeline::{ItemPipeline, ItemStage};
use crate::prompts::{CITY_TEMPLATE, OPTIONS_TEMPLATE};
use crate::storage::{load_options, write_json, RecordStore};
use crate::types::{
    format_elapsed, BatchSummary, CityRecords, CityRow, Item, OptionList,
};
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Deals `rows` to `workers` buckets: row `i` goes to worker `i % workers`.
pub fn assign_round_robin(rows: &[CityRow], workers: usize) -> Vec<Vec<CityRow>> {
    let workers = workers.max(1);
    let mut buckets = vec![Vec::new(); workers];
    for (i, row) in rows.iter().enumerate() {
        buckets[i % workers].push(row.clone());
    }
    buckets
}

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub category: String,
    /// Directory holding `<city_key>.json` option lists for this category.
    pub options_dir: PathBuf,
    pub store: RecordStore,
    /// Only process items missing from existing city documents.
    pub resume: bool,
    /// Send one prompt per city instead of one per option.
    pub per_city: bool,
    /// The template rendered for each city when `per_city` is set.
    pub city_template: String,
}

impl BatchSettings {
    pub fn new(
        category: impl Into<String>,
        options_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            category: category.into(),
            options_dir: options_dir.into(),
            store: RecordStore::new(output_dir),
            resume: false,
            per_city: false,
            city_template: CITY_TEMPLATE.to_string(),
        }
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn with_per_city(mut self, per_city: bool) -> Self {
        self.per_city = per_city;
        self
    }

    pub fn with_city_template(mut self, template: impl Into<String>) -> Self {
        self.city_template = template.into();
        self
    }

    pub fn options_path(&self, city_key: &str) -> PathBuf {
        self.options_dir.join(format!("{city_key}.json"))
    }
}

pub struct BatchRunner {
    catalog: Arc<CityCatalog>,
    settings: Arc<BatchSettings>,
    workers: Vec<Arc<ItemPipeline>>,
}

impl BatchRunner {
    pub fn new(
        catalog: CityCatalog,
        settings: BatchSettings,
        workers: Vec<Arc<ItemPipeline>>,
    ) -> Self {
        Self {
            catalog: Arc::new(catalog),
            settings: Arc::new(settings),
            workers,
        }
    }

    pub async fn run(&self) -> Result<BatchSummary, BatchError> {
        if self.workers.is_empty() {
            return Err(BatchError::NoWorkers);
        }
        if self.settings.per_city {
            if let Some(pipeline) = self.workers.first() {
                pipeline.templates().get(&self.settings.city_template)?;
            }
        }
        let started = Instant::now();
        info!(
            category = %self.settings.category,
            cities = self.catalog.len(),
            workers = self.workers.len(),
            resume = self.settings.resume,
            per_city = self.settings.per_city,
            "Starting batch"
        );

        let buckets = assign_round_robin(self.catalog.rows(), self.workers.len());
        let handles = self
            .workers
            .iter()
            .zip(buckets)
            .enumerate()
            .map(|(worker_id, (pipeline, cities))| {
                let pipeline = Arc::clone(pipeline);
                let settings = Arc::clone(&self.settings);
                let catalog = Arc::clone(&self.catalog);
                tokio::spawn(async move {
                    run_worker(worker_id, pipeline, settings, catalog, cities).await
                })
            });

        let mut summary = BatchSummary::default();
        for joined in join_all(handles).await {
            let worker_summary = joined.map_err(|e| BatchError::Worker(e.to_string()))?;
            summary.merge(worker_summary);
        }

        self.settings.store.write_report(&summary.missing)?;
        summary.elapsed = started.elapsed();
        info!(
            category = %self.settings.category,
            cities_processed = summary.cities_processed,
            cities_skipped = summary.cities_skipped,
            items_persisted = summary.items_persisted,
            items_discarded = summary.items_discarded,
            "Batch finished in {}",
            format_elapsed(summary.elapsed)
        );
        Ok(summary)
    }
}

async fn run_worker(
    worker_id: usize,
    pipeline: Arc<ItemPipeline>,
    settings: Arc<BatchSettings>,
    catalog: Arc<CityCatalog>,
    cities: Vec<CityRow>,
) -> BatchSummary {
    info!(worker_id, cities = cities.len(), "Worker started");
    let mut summary = BatchSummary::default();
    for city in &cities {
        if settings.per_city {
            describe_city(&pipeline, &settings, &catalog, city, &mut summary).await;
        } else {
            process_city(&pipeline, &settings, city, &mut summary).await;
        }
    }
    info!(worker_id, items_persisted = summary.items_persisted, "Worker finished");
    summary
}

async fn process_city(
    pipeline: &ItemPipeline,
    settings: &BatchSettings,
    city: &CityRow,
    summary: &mut BatchSummary,
) {
    let city_key = storage_key(&city.city);

    let options = match load_options(&settings.options_path(&city_key)) {
        Ok(options) => options,
        Err(e) => {
            error!(severity = "critical", city = %city.city, error = %e, "No option list, skipping city");
            summary.cities_skipped += 1;
            summary.missing.cities.push(city_key);
            return;
        }
    };

    let existing = if settings.resume {
        match settings.store.read_records(&city_key) {
            Ok(records) => records.unwrap_or_default(),
            Err(e) => {
                error!(severity = "critical", city = %city.city, error = %e, "Unreadable city document, skipping city");
                summary.cities_skipped += 1;
                summary.missing.cities.push(city_key);
                return;
            }
        }
    } else {
        CityRecords::new()
    };

    info!(city = %city.city, options = options.len(), existing = existing.len(), "Processing city");
    let mut generated = CityRecords::new();
    let mut discarded = Vec::new();
    for (key, entry) in &options {
        if existing.contains_key(key) {
            summary.items_already_present += 1;
            continue;
        }
        let item = Item::from_option(key, entry, city);
        match pipeline.process(&item).await {
            Ok(record) => {
                generated.insert(key.clone(), record);
            }
            Err(discard) => discarded.push(discard.key),
        }
    }

    let persisted = generated.len();
    let generated_keys: Vec<String> = generated.keys().cloned().collect();
    let records = merge_in_option_order(&options, existing, generated);
    if let Err(e) = settings.store.write_records(&city_key, &records) {
        error!(
            severity = "critical",
            city = %city.city,
            stage = %ItemStage::Validated,
            lost = ?generated_keys,
            error = %e,
            "Failed to save city document"
        );
        summary.cities_skipped += 1;
        summary.items_discarded += persisted + discarded.len();
        let mut lost = discarded;
        lost.extend(generated_keys);
        summary.missing.items.insert(city_key, lost);
        return;
    }

    info!(city = %city.city, stage = %ItemStage::Persisted, items = persisted, "Saved city document");
    summary.cities_processed += 1;
    summary.items_persisted += persisted;
    summary.items_discarded += discarded.len();
    if !discarded.is_empty() {
        warn!(city = %city.city, missing = ?discarded, "Some items were discarded");
        summary.missing.items.insert(city_key, discarded);
    }
}

/// Sends the city template for one city and stores the answer as its document.
///
/// Each stored document counts as one persisted item. A city whose call or
/// parse fails is listed in the missing report and no document is written, so a
/// resumed run retries it.
async fn describe_city(
    pipeline: &ItemPipeline,
    settings: &BatchSettings,
    catalog: &CityCatalog,
    city: &CityRow,
    summary: &mut BatchSummary,
) {
    let city_key = storage_key(&city.city);

    if settings.resume {
        match settings.store.read_document::<Value>(&city_key) {
            Ok(Some(_)) => {
                summary.items_already_present += 1;
                return;
            }
            Ok(None) => {}
            Err(e) => {
                error!(severity = "critical", city = %city.city, error = %e, "Unreadable city document, skipping city");
                summary.cities_skipped += 1;
                summary.missing.cities.push(city_key);
                return;
            }
        }
    }

    info!(city = %city.city, "Processing city");
    let outcome = async {
        let prompt = pipeline
            .templates()
            .render(&settings.city_template, &city_values(catalog, city))?;
        let mut payload = pipeline.ask(&prompt).await?;
        resolve_destinations(catalog, &mut payload);
        Ok::<_, ItemError>(payload)
    }
    .await;

    let payload = match outcome {
        Ok(payload) => payload,
        Err(e) => {
            error!(city = %city.city, error = %e, "City discarded");
            summary.cities_skipped += 1;
            summary.missing.cities.push(city_key);
            return;
        }
    };

    match settings.store.write_document(&city_key, &payload) {
        Ok(path) => {
            info!(city = %city.city, stage = %ItemStage::Persisted, path = %path.display(), "Saved city document");
            summary.cities_processed += 1;
            summary.items_persisted += 1;
        }
        Err(e) => {
            error!(severity = "critical", city = %city.city, error = %e, "Failed to save city document");
            summary.cities_skipped += 1;
            summary.missing.cities.push(city_key);
        }
    }
}

/// Placeholder values for a city-level prompt: `city`, `country`, and
/// `city_list`, the other cities of the catalog.
fn city_values(catalog: &CityCatalog, city: &CityRow) -> HashMap<&'static str, String> {
    let others: Vec<&str> = catalog
        .rows()
        .iter()
        .map(|row| row.city.as_str())
        .filter(|name| *name != city.city)
        .collect();
    HashMap::from([
        ("city", city.city.clone()),
        ("country", city.country.clone()),
        ("city_list", others.join(", ")),
    ])
}

/// Adds `destinations_id` when the answer lists `destinations` by city name.
/// Names missing from the catalog, or without an id, are left out.
fn resolve_destinations(catalog: &CityCatalog, payload: &mut NormalizedPayload) {
    let Some(Value::Array(names)) = payload.get("destinations") else {
        return;
    };
    let ids: Vec<Value> = names
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|name| catalog.city_id(name))
        .map(Value::from)
        .collect();
    payload.insert("destinations_id".to_string(), Value::Array(ids));
}

/// Orders records by the option list, keeping records for keys no longer in it
/// at the end.
fn merge_in_option_order(
    options: &OptionList,
    mut existing: CityRecords,
    mut generated: CityRecords,
) -> CityRecords {
    let mut merged = CityRecords::with_capacity(existing.len() + generated.len());
    for key in options.keys() {
        if let Some(record) = existing
            .shift_remove(key)
            .or_else(|| generated.shift_remove(key))
        {
            merged.insert(key.clone(), record);
        }
    }
    merged.extend(existing);
    merged.extend(generated);
    merged
}

/// Asks the model for each city's option list and writes it to
/// `<options_dir>/<city_key>.json`.
pub struct OptionCollector {
    catalog: CityCatalog,
    options_dir: PathBuf,
    workers: Vec<Arc<ItemPipeline>>,
    template: String,
    skip_existing: bool,
}

impl OptionCollector {
    pub fn new(
        catalog: CityCatalog,
        options_dir: impl Into<PathBuf>,
        workers: Vec<Arc<ItemPipeline>>,
    ) -> Self {
        Self {
            catalog,
            options_dir: options_dir.into(),
            workers,
            template: OPTIONS_TEMPLATE.to_string(),
            skip_existing: false,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Leaves cities that already have an option file untouched.
    pub fn skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    pub async fn run(&self) -> Result<BatchSummary, BatchError> {
        if self.workers.is_empty() {
            return Err(BatchError::NoWorkers);
        }
        if let Some(pipeline) = self.workers.first() {
            pipeline.templates().get(&self.template)?;
        }
        let started = Instant::now();
        info!(cities = self.catalog.len(), workers = self.workers.len(), "Collecting option lists");

        let buckets = assign_round_robin(self.catalog.rows(), self.workers.len());
        let handles = self.workers.iter().zip(buckets).map(|(pipeline, cities)| {
            let pipeline = Arc::clone(pipeline);
            let options_dir = self.options_dir.clone();
            let template = self.template.clone();
            let skip_existing = self.skip_existing;
            tokio::spawn(async move {
                let mut summary = BatchSummary::default();
                for city in &cities {
                    collect_city(&pipeline, &options_dir, &template, skip_existing, city, &mut summary)
                        .await;
                }
                summary
            })
        });

        let mut summary = BatchSummary::default();
        for joined in join_all(handles).await {
            summary.merge(joined.map_err(|e| BatchError::Worker(e.to_string()))?);
        }
        summary.elapsed = started.elapsed();
        info!(
            collected = summary.items_persisted,
            failed = summary.cities_skipped,
            "Option collection finished in {}",
            format_elapsed(summary.elapsed)
        );
        Ok(summary)
    }
}

async fn collect_city(
    pipeline: &ItemPipeline,
    options_dir: &Path,
    template: &str,
    skip_existing: bool,
    city: &CityRow,
    summary: &mut BatchSummary,
) {
    let city_key = storage_key(&city.city);
    let path = options_dir.join(format!("{city_key}.json"));
    if skip_existing && path.exists() {
        summary.items_already_present += 1;
        return;
    }

    let item = Item::new("", "", &city.city, &city.country);
    let outcome = async {
        let prompt = pipeline.templates().render(template, &item.template_values())?;
        let payload = pipeline.ask(&prompt).await?;
        serde_json::from_value::<OptionList>(Value::Object(payload)).map_err(|e| {
            warn!(city = %city.city, error = %e, "Option list has an unexpected shape");
            ItemError::InvalidField {
                field: "options".to_string(),
                expected: "an object mapping item keys to option names",
            }
        })
    }
    .await;

    match outcome {
        Ok(options) => match write_json(&path, &options) {
            Ok(()) => {
                info!(city = %city.city, options = options.len(), "Saved option list");
                summary.cities_processed += 1;
                summary.items_persisted += 1;
            }
            Err(e) => {
                error!(city = %city.city, error = %e, "Failed to save option list");
                summary.cities_skipped += 1;
                summary.missing.cities.push(city_key);
            }
        },
        Err(e) => {
            error!(city = %city.city, error = %e, "Failed to collect options");
            summary.cities_skipped += 1;
            summary.missing.cities.push(city_key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentRecord;

    fn row(city: &str) -> CityRow {
        CityRow {
            city: city.to_string(),
            country: "X".to_string(),
            id_city: None,
        }
    }

    fn record(name: &str) -> ContentRecord {
        ContentRecord {
            name: name.to_string(),
            location: "A, X".to_string(),
            meta: String::new(),
            keywords: vec![],
            title: String::new(),
            text: String::new(),
            links: vec![],
            images: vec![],
        }
    }

    #[test]
    fn cities_are_dealt_round_robin() {
        let rows: Vec<_> = ["a", "b", "c", "d", "e"].into_iter().map(row).collect();
        let buckets = assign_round_robin(&rows, 2);
        let names = |b: &Vec<CityRow>| b.iter().map(|r| r.city.clone()).collect::<Vec<_>>();
        assert_eq!(names(&buckets[0]), vec!["a", "c", "e"]);
        assert_eq!(names(&buckets[1]), vec!["b", "d"]);
    }

    #[test]
    fn destinations_are_resolved_to_catalog_ids() {
        let catalog = CityCatalog::from_rows(vec![
            CityRow {
                city: "Lyon".to_string(),
                country: "France".to_string(),
                id_city: Some(7),
            },
            CityRow {
                city: "Nice".to_string(),
                country: "France".to_string(),
                id_city: Some(9),
            },
        ]);
        let mut payload: NormalizedPayload =
            serde_json::from_str(r#"{"destinations": ["Nice", "Atlantis", "Lyon"]}"#).unwrap();

        resolve_destinations(&catalog, &mut payload);

        assert_eq!(payload["destinations_id"], serde_json::json!([9, 7]));
    }

    #[test]
    fn city_list_excludes_the_city_itself() {
        let catalog = CityCatalog::from_rows(vec![row("a"), row("b"), row("c")]);
        let values = city_values(&catalog, &row("b"));
        assert_eq!(values["city_list"], "a, c");
        assert_eq!(values["city"], "b");
    }

    #[test]
    fn merged_records_follow_option_order() {
        let options: OptionList =
            serde_json::from_str(r#"{"1": "one", "2": "two", "3": "three"}"#).unwrap();
        let existing = CityRecords::from([("3".to_string(), record("three"))]);
        let generated = CityRecords::from([
            ("2".to_string(), record("two")),
            ("1".to_string(), record("one")),
        ]);
        let merged = merge_in_option_order(&options, existing, generated);
        assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["1", "2", "3"]);
    }
}

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// One row of the input city list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityRow {
    pub city: String,
    pub country: String,
    #[serde(default)]
    pub id_city: Option<u32>,
}

/// A value in a per-city option list.
///
/// Option lists are either `{"1": "Le Petit Bistro", ...}` or, when a previous
/// pass already produced a description, `{"1": {"name": ..., "description": ...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionEntry {
    Name(String),
    Detailed {
        name: String,
        #[serde(default, alias = "text")]
        description: Option<String>,
    },
}

impl OptionEntry {
    pub fn name(&self) -> &str {
        match self {
            OptionEntry::Name(name) => name,
            OptionEntry::Detailed { name, .. } => name,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            OptionEntry::Name(_) => None,
            OptionEntry::Detailed { description, .. } => description.as_deref(),
        }
    }
}

/// Item key to option, in file order.
pub type OptionList = IndexMap<String, OptionEntry>;

/// The smallest unit of work: one option for one city.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub key: String,
    pub option: String,
    pub city: String,
    pub country: String,
    pub source_text: Option<String>,
}

impl Item {
    pub fn new(
        key: impl Into<String>,
        option: impl Into<String>,
        city: impl Into<String>,
        country: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            option: option.into(),
            city: city.into(),
            country: country.into(),
            source_text: None,
        }
    }

    pub fn with_source_text(mut self, text: impl Into<String>) -> Self {
        self.source_text = Some(text.into());
        self
    }

    pub fn from_option(key: &str, entry: &OptionEntry, city: &CityRow) -> Self {
        Self {
            key: key.to_string(),
            option: entry.name().to_string(),
            city: city.city.clone(),
            country: city.country.clone(),
            source_text: entry.description().map(str::to_string),
        }
    }

    /// `"City, Country"`.
    pub fn location(&self) -> String {
        format!("{}, {}", self.city, self.country)
    }

    /// The placeholder values available to this item's prompt templates.
    pub fn template_values(&self) -> HashMap<&'static str, String> {
        let mut values = HashMap::from([
            ("city", self.city.clone()),
            ("country", self.country.clone()),
            ("option", self.option.clone()),
        ]);
        if let Some(text) = &self.source_text {
            values.insert("text", text.clone());
        }
        values
    }
}

/// The persisted unit of generated content for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub name: String,
    pub location: String,
    pub meta: String,
    pub keywords: Vec<String>,
    pub title: String,
    pub text: String,
    pub links: Vec<String>,
    pub images: Vec<String>,
}

/// All records of one city for one category, keyed by item key in option order.
pub type CityRecords = IndexMap<String, ContentRecord>;

/// Items and cities that did not make it into the output of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingReport {
    /// City key to the item keys that were discarded.
    pub items: BTreeMap<String, Vec<String>>,
    /// Cities skipped entirely (no option list, unreadable document, failed call).
    pub cities: Vec<String>,
}

impl MissingReport {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.cities.is_empty()
    }

    pub fn merge(&mut self, other: MissingReport) {
        for (city, keys) in other.items {
            self.items.entry(city).or_default().extend(keys);
        }
        self.cities.extend(other.cities);
        self.cities.sort();
    }
}

/// Counters reported at the end of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub cities_processed: usize,
    pub cities_skipped: usize,
    pub items_persisted: usize,
    pub items_discarded: usize,
    /// Items already present in the output document during a repair pass.
    pub items_already_present: usize,
    pub missing: MissingReport,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn merge(&mut self, other: BatchSummary) {
        self.cities_processed += other.cities_processed;
        self.cities_skipped += other.cities_skipped;
        self.items_persisted += other.items_persisted;
        self.items_discarded += other.items_discarded;
        self.items_already_present += other.items_already_present;
        self.missing.merge(other.missing);
    }
}

/// Formats a duration as `"H hours, M minutes, S seconds"`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{} hours, {} minutes, {} seconds",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_entries_accept_both_shapes() {
        let list: OptionList = serde_json::from_str(
            r#"{"1": "Le Petit Bistro", "2": {"name": "Hotel Lutetia", "description": "Art deco."}}"#,
        )
        .unwrap();
        assert_eq!(list["1"], OptionEntry::Name("Le Petit Bistro".to_string()));
        assert_eq!(list["2"].name(), "Hotel Lutetia");
        assert_eq!(list["2"].description(), Some("Art deco."));
        assert_eq!(list.keys().collect::<Vec<_>>(), vec!["1", "2"]);
    }

    #[test]
    fn elapsed_is_split_into_hours_minutes_seconds() {
        assert_eq!(
            format_elapsed(Duration::from_secs(3 * 3600 + 25 * 60 + 7)),
            "3 hours, 25 minutes, 7 seconds"
        );
    }
}

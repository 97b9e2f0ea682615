//! # City Catalog
//!
//! Loads the list of cities a batch iterates over from a CSV file with at least
//! `city` and `country` columns (an `id_city` column is optional).

use crate::errors::BatchError;
use crate::types::CityRow;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// The column a catalog is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    #[default]
    City,
    Country,
}

impl FromStr for SortColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "city" => Ok(SortColumn::City),
            "country" => Ok(SortColumn::Country),
            other => Err(format!("unknown sort column '{other}', expected 'city' or 'country'")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CityCatalog {
    rows: Vec<CityRow>,
}

impl CityCatalog {
    /// Reads every row of the CSV file at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, BatchError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| BatchError::io(path, e))?;
        let catalog = Self::from_reader(file)?;
        info!(path = %path.display(), rows = catalog.len(), "Loaded city catalog");
        Ok(catalog)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, BatchError> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let rows = reader
            .deserialize::<CityRow>()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rows })
    }

    pub fn from_rows(rows: Vec<CityRow>) -> Self {
        Self { rows }
    }

    /// Returns the catalog ordered by `column` (stable, so ties keep file order).
    pub fn sorted_by(mut self, column: SortColumn) -> Self {
        match column {
            SortColumn::City => self.rows.sort_by(|a, b| a.city.cmp(&b.city)),
            SortColumn::Country => self.rows.sort_by(|a, b| a.country.cmp(&b.country)),
        }
        self
    }

    /// Keeps rows `from..to`. Out-of-range bounds are clamped.
    pub fn slice(mut self, from: Option<usize>, to: Option<usize>) -> Self {
        let len = self.rows.len();
        let to = to.unwrap_or(len).min(len);
        let from = from.unwrap_or(0).min(to);
        self.rows = self.rows.drain(from..to).collect();
        self
    }

    /// Keeps only the named cities.
    pub fn only(mut self, cities: &[String]) -> Self {
        self.rows.retain(|row| cities.iter().any(|c| c == &row.city));
        self
    }

    pub fn rows(&self) -> &[CityRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The `id_city` of the named city, when the catalog carries ids.
    pub fn city_id(&self, name: &str) -> Option<u32> {
        self.rows
            .iter()
            .find(|row| row.city == name)
            .and_then(|row| row.id_city)
    }
}

/// Derives the file-system key of a city: spaces and hyphens become underscores.
pub fn storage_key(name: &str) -> String {
    name.replace([' ', '-'], "_")
}

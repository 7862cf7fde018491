use crate::core::vocabulary::normalize;
use crate::models::{ListingDetails, PropertyRecord};
use chrono::{DateTime, Utc};
use csv::StringRecord;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while loading the property catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid field mapping: {0}")]
    InvalidMapping(String),

    #[error("Catalog {0} contains no usable rows")]
    Empty(String),

    #[error("No catalog source configured")]
    NoSource,
}

/// PropertyRecord fields an external column can feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyField {
    Id,
    Location,
    Sqft,
    Price,
    Amenities,
    Available,
    Culture,
    Floor,
    Suite,
    RentPerSfYear,
    ContactName,
    ContactEmail,
}

impl PropertyField {
    pub const ALL: [PropertyField; 12] = [
        PropertyField::Id,
        PropertyField::Location,
        PropertyField::Sqft,
        PropertyField::Price,
        PropertyField::Amenities,
        PropertyField::Available,
        PropertyField::Culture,
        PropertyField::Floor,
        PropertyField::Suite,
        PropertyField::RentPerSfYear,
        PropertyField::ContactName,
        PropertyField::ContactEmail,
    ];

    pub fn is_required(self) -> bool {
        matches!(self, PropertyField::Id | PropertyField::Location | PropertyField::Sqft | PropertyField::Price)
    }
}

/// One `column -> field` entry of the mapping table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub column: String,
    pub field: PropertyField,
}

impl ColumnMapping {
    fn new(column: &str, field: PropertyField) -> Self {
        Self { column: column.to_string(), field }
    }
}

/// Named, enumerable mapping from external columns to PropertyRecord fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    #[serde(default = "default_columns")]
    pub columns: Vec<ColumnMapping>,
    /// Separator inside the amenities and culture columns
    #[serde(default = "default_amenity_separator")]
    pub amenity_separator: String,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            columns: default_columns(),
            amenity_separator: default_amenity_separator(),
        }
    }
}

fn default_columns() -> Vec<ColumnMapping> {
    vec![
        ColumnMapping::new("unique_id", PropertyField::Id),
        ColumnMapping::new("Property Address", PropertyField::Location),
        ColumnMapping::new("Size (SF)", PropertyField::Sqft),
        ColumnMapping::new("Monthly Rent", PropertyField::Price),
        ColumnMapping::new("Amenities", PropertyField::Amenities),
        ColumnMapping::new("Available", PropertyField::Available),
        ColumnMapping::new("Culture", PropertyField::Culture),
        ColumnMapping::new("Floor", PropertyField::Floor),
        ColumnMapping::new("Suite", PropertyField::Suite),
        ColumnMapping::new("Rent/SF/Year", PropertyField::RentPerSfYear),
        ColumnMapping::new("Associate 1", PropertyField::ContactName),
        ColumnMapping::new("BROKER Email ID", PropertyField::ContactEmail),
    ]
}

fn default_amenity_separator() -> String { ";".to_string() }

impl FieldMapping {
    /// Every required field mapped, no field or column mapped twice
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut fields = HashSet::new();
        let mut columns = HashSet::new();

        for entry in &self.columns {
            let column = entry.column.trim();
            if column.is_empty() {
                return Err(CatalogError::InvalidMapping(format!("empty column name for {:?}", entry.field)));
            }
            if !fields.insert(entry.field) {
                return Err(CatalogError::InvalidMapping(format!("{:?} is mapped more than once", entry.field)));
            }
            if !columns.insert(column.to_lowercase()) {
                return Err(CatalogError::InvalidMapping(format!("column \"{}\" is mapped more than once", column)));
            }
        }

        if let Some(missing) = PropertyField::ALL.iter().find(|f| f.is_required() && !fields.contains(*f)) {
            return Err(CatalogError::InvalidMapping(format!("required field {:?} is not mapped", missing)));
        }
        if self.amenity_separator.is_empty() {
            return Err(CatalogError::InvalidMapping("amenity separator is empty".to_string()));
        }
        Ok(())
    }

    /// Locate each mapped column in a header row. Headers match case-insensitively.
    fn resolve(&self, headers: &StringRecord) -> Result<ResolvedColumns, CatalogError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
        };

        let mut resolved = ResolvedColumns::default();
        for entry in &self.columns {
            let index = find(&entry.column);
            if index.is_none() && entry.field.is_required() {
                return Err(CatalogError::InvalidMapping(format!(
                    "column \"{}\" for {:?} not found in header",
                    entry.column, entry.field
                )));
            }
            match entry.field {
                PropertyField::Id => resolved.id = index,
                PropertyField::Location => resolved.location = index,
                PropertyField::Sqft => resolved.sqft = index,
                PropertyField::Price => resolved.price = index,
                PropertyField::Amenities => resolved.amenities = index,
                PropertyField::Available => resolved.available = index,
                PropertyField::Culture => resolved.culture = index,
                PropertyField::Floor => resolved.floor = index,
                PropertyField::Suite => resolved.suite = index,
                PropertyField::RentPerSfYear => resolved.rent_per_sf_year = index,
                PropertyField::ContactName => resolved.contact_name = index,
                PropertyField::ContactEmail => resolved.contact_email = index,
            }
        }
        Ok(resolved)
    }
}

#[derive(Debug, Default)]
struct ResolvedColumns {
    id: Option<usize>,
    location: Option<usize>,
    sqft: Option<usize>,
    price: Option<usize>,
    amenities: Option<usize>,
    available: Option<usize>,
    culture: Option<usize>,
    floor: Option<usize>,
    suite: Option<usize>,
    rent_per_sf_year: Option<usize>,
    contact_name: Option<usize>,
    contact_email: Option<usize>,
}

/// A skipped or repaired row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowWarning {
    /// 1-based data row, header excluded
    pub row: usize,
    pub reason: String,
}

/// Outcome of a successful load
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadReport {
    pub version: u64,
    #[serde(rename = "rowsLoaded")]
    pub rows_loaded: usize,
    #[serde(rename = "rowsSkipped")]
    pub rows_skipped: usize,
    pub warnings: Vec<RowWarning>,
}

/// Parse a catalog from any CSV reader. Malformed rows are skipped and
/// reported; only a catalog with zero usable rows is an error.
pub fn parse_catalog<R: Read>(
    reader: R,
    mapping: &FieldMapping,
    source: &str,
) -> Result<(Vec<PropertyRecord>, Vec<RowWarning>), CatalogError> {
    mapping.validate()?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);
    let columns = mapping.resolve(reader.headers()?)?;

    let mut records = Vec::new();
    let mut warnings = Vec::new();
    let mut seen_ids = HashSet::new();

    for (index, result) in reader.records().enumerate() {
        let row = index + 1;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warnings.push(RowWarning { row, reason: format!("unreadable row: {}", e) });
                continue;
            }
        };

        match parse_row(&record, &columns, mapping) {
            Ok(property) => {
                if !seen_ids.insert(property.id.clone()) {
                    warnings.push(RowWarning { row, reason: format!("duplicate id {}", property.id) });
                    continue;
                }
                records.push(property);
            }
            Err(reason) => warnings.push(RowWarning { row, reason }),
        }
    }

    if records.is_empty() {
        return Err(CatalogError::Empty(source.to_string()));
    }
    Ok((records, warnings))
}

pub fn load_catalog(path: &Path, mapping: &FieldMapping) -> Result<(Vec<PropertyRecord>, Vec<RowWarning>), CatalogError> {
    let file = std::fs::File::open(path)?;
    parse_catalog(file, mapping, &path.display().to_string())
}

fn parse_row(record: &StringRecord, columns: &ResolvedColumns, mapping: &FieldMapping) -> Result<PropertyRecord, String> {
    let cell = |index: Option<usize>| index.and_then(|i| record.get(i)).map(str::trim).unwrap_or("");

    let id = cell(columns.id);
    if id.is_empty() {
        return Err("missing id".to_string());
    }
    let location = cell(columns.location);
    if location.is_empty() {
        return Err(format!("{}: missing location", id));
    }

    let sqft = parse_number(cell(columns.sqft))
        .filter(|v| *v > 0.0 && *v <= u32::MAX as f64)
        .ok_or_else(|| format!("{}: unusable size \"{}\"", id, cell(columns.sqft)))?;
    let rent_per_sf_year = parse_number(cell(columns.rent_per_sf_year)).filter(|v| *v >= 0.0);
    // A blank monthly rent is derived from the quoted yearly rate
    let price = parse_number(cell(columns.price))
        .filter(|v| *v >= 0.0)
        .or_else(|| match cell(columns.price) {
            "" => rent_per_sf_year.map(|rate| (rate * sqft / 12.0 * 100.0).round() / 100.0),
            _ => None,
        })
        .ok_or_else(|| format!("{}: unusable rent \"{}\"", id, cell(columns.price)))?;

    let list = |index: Option<usize>| -> BTreeSet<String> {
        cell(index)
            .split(mapping.amenity_separator.as_str())
            .map(normalize)
            .filter(|a| !a.is_empty())
            .collect()
    };
    let text = |index: Option<usize>| Some(cell(index)).filter(|v| !v.is_empty()).map(str::to_string);

    let available = match cell(columns.available) {
        "" => true,
        raw => parse_flag(raw).ok_or_else(|| format!("{}: unusable availability \"{}\"", id, raw))?,
    };

    Ok(PropertyRecord {
        id: id.to_string(),
        location: location.to_string(),
        sqft: sqft.round() as u32,
        price,
        amenities: list(columns.amenities),
        available,
        culture: list(columns.culture),
        details: ListingDetails {
            floor: text(columns.floor),
            suite: text(columns.suite),
            rent_per_sf_year,
            contact_name: text(columns.contact_name),
            contact_email: text(columns.contact_email),
        },
    })
}

/// Number with `$`, thousands separators and spaces removed
fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| !matches!(c, '$' | ',' | ' ')).collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "available" => Some(true),
        "false" | "no" | "n" | "0" | "unavailable" | "leased" => Some(false),
        _ => None,
    }
}

/// Immutable catalog version shared by every scoring pass
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub version: u64,
    pub loaded_at: DateTime<Utc>,
    pub source: String,
    pub records: Vec<PropertyRecord>,
}

/// Holds the current catalog snapshot.
///
/// Readers clone the `Arc` once and score against it; a reload builds the new
/// snapshot off-lock and swaps the pointer, so a pass never sees mixed rows.
pub struct CatalogStore {
    current: RwLock<Arc<CatalogSnapshot>>,
    path: Option<PathBuf>,
    mapping: FieldMapping,
}

impl CatalogStore {
    /// Store with a fixed set of records and no file behind it
    pub fn new(records: Vec<PropertyRecord>) -> Self {
        Self {
            current: RwLock::new(Arc::new(CatalogSnapshot {
                version: 1,
                loaded_at: Utc::now(),
                source: "memory".to_string(),
                records,
            })),
            path: None,
            mapping: FieldMapping::default(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Load the catalog file. Any failure here is a fatal setup error.
    pub fn open(path: impl Into<PathBuf>, mapping: FieldMapping) -> Result<(Self, LoadReport), CatalogError> {
        let path = path.into();
        let (records, warnings) = load_catalog(&path, &mapping)?;
        let report = LoadReport {
            version: 1,
            rows_loaded: records.len(),
            rows_skipped: warnings.len(),
            warnings,
        };
        let store = Self {
            current: RwLock::new(Arc::new(CatalogSnapshot {
                version: 1,
                loaded_at: Utc::now(),
                source: path.display().to_string(),
                records,
            })),
            path: Some(path),
            mapping,
        };
        Ok((store, report))
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.current.read().clone()
    }

    pub fn version(&self) -> u64 {
        self.current.read().version
    }

    /// Install a new record set, returning its version
    pub fn replace(&self, records: Vec<PropertyRecord>, source: impl Into<String>) -> u64 {
        let source = source.into();
        let mut current = self.current.write();
        let version = current.version + 1;
        *current = Arc::new(CatalogSnapshot { version, loaded_at: Utc::now(), source, records });
        version
    }

    /// Re-read the configured file. On failure the previous snapshot stays live.
    pub fn reload(&self) -> Result<LoadReport, CatalogError> {
        let path = self.path.as_ref().ok_or(CatalogError::NoSource)?;
        let (records, warnings) = load_catalog(path, &self.mapping)?;
        let rows_loaded = records.len();
        let version = self.replace(records, path.display().to_string());

        tracing::info!("Catalog reloaded from {} (version {}, {} rows)", path.display(), version, rows_loaded);
        for warning in &warnings {
            tracing::warn!("Catalog row {} skipped: {}", warning.row, warning.reason);
        }

        Ok(LoadReport {
            version,
            rows_loaded,
            rows_skipped: warnings.len(),
            warnings,
        })
    }
}

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;

use valuation_core::{ListingObservation, ValuationError};

/// Past price observations used to train the model set.
///
/// Observations are kept ordered by date (ties by `house_id`) and the earliest
/// date becomes the anchor of the `days_since_start` time feature.
#[derive(Debug, Clone)]
pub struct HistoricalCorpus {
    observations: Vec<ListingObservation>,
    start_date: NaiveDate,
}

/// Row layout written by the synthetic generator and older CSV exports.
#[derive(Debug, Deserialize)]
struct CorpusRow {
    house_id: String,
    address: String,
    neighborhood_id: i64,
    neighborhood_name: String,
    #[serde(default, alias = "latitude")]
    lat: Option<f64>,
    #[serde(default, alias = "longitude")]
    long: Option<f64>,
    sqft: f64,
    beds: f64,
    baths: f64,
    #[serde(alias = "recurring_fee")]
    hoa_fee: f64,
    date: String,
    price: f64,
    #[serde(default)]
    property_type: Option<String>,
    #[serde(default)]
    days_on_market: Option<u32>,
    #[serde(default)]
    year_built: Option<i32>,
}

/// Accepts `YYYY-MM-DD` as well as timestamps such as `YYYY-MM-DD HH:MM:SS.ffffff`.
pub fn parse_observation_date(raw: &str) -> Result<NaiveDate, ValuationError> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(ts.date());
        }
    }
    // RFC 3339 with offset, e.g. provider listing dates
    chrono::DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.date_naive())
        .map_err(|_| ValuationError::InvalidData(format!("unparseable date '{raw}'")))
}

impl HistoricalCorpus {
    pub fn new(mut observations: Vec<ListingObservation>) -> Result<Self, ValuationError> {
        if observations.is_empty() {
            return Err(ValuationError::InsufficientData(
                "historical corpus is empty".into(),
            ));
        }
        for obs in &observations {
            validate_observation(obs)?;
        }
        observations.sort_by(|a, b| {
            a.observed_at
                .cmp(&b.observed_at)
                .then_with(|| a.house_id.cmp(&b.house_id))
        });
        let start_date = observations[0].observed_at;
        Ok(Self {
            observations,
            start_date,
        })
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, ValuationError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            ValuationError::InsufficientData(format!(
                "cannot open corpus {}: {}",
                path.display(),
                e
            ))
        })?;
        let corpus = Self::from_reader(file)?;
        tracing::info!(
            "Loaded {} observations ({} houses) from {}",
            corpus.len(),
            corpus.house_count(),
            path.display()
        );
        Ok(corpus)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ValuationError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut observations = Vec::new();
        for (idx, record) in csv_reader.deserialize::<CorpusRow>().enumerate() {
            let row = record
                .map_err(|e| ValuationError::InvalidData(format!("corpus row {}: {}", idx + 1, e)))?;
            observations.push(ListingObservation {
                observed_at: parse_observation_date(&row.date)?,
                house_id: row.house_id,
                address: row.address,
                neighborhood_id: row.neighborhood_id,
                neighborhood_name: row.neighborhood_name,
                sqft: row.sqft,
                beds: row.beds,
                baths: row.baths,
                recurring_fee: row.hoa_fee,
                price: row.price,
                property_type: row.property_type.filter(|s| !s.is_empty()),
                days_on_market: row.days_on_market,
                year_built: row.year_built,
                latitude: row.lat,
                longitude: row.long,
                description: None,
            });
        }
        Self::new(observations)
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    /// Days elapsed between the corpus anchor and `date`; negative for earlier dates.
    pub fn days_since_start(&self, date: NaiveDate) -> i64 {
        (date - self.start_date).num_days()
    }

    pub fn observations(&self) -> &[ListingObservation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn house_count(&self) -> usize {
        self.observations
            .iter()
            .map(|o| o.house_id.as_str())
            .collect::<std::collections::HashSet<_>>()
            .len()
    }

    /// Observations grouped by neighborhood, in ascending neighborhood id order.
    pub fn clusters(&self) -> BTreeMap<i64, Vec<&ListingObservation>> {
        let mut clusters: BTreeMap<i64, Vec<&ListingObservation>> = BTreeMap::new();
        for obs in &self.observations {
            clusters.entry(obs.neighborhood_id).or_default().push(obs);
        }
        clusters
    }

    /// Most recent observation for every house, ordered by `house_id`.
    pub fn latest_per_house(&self) -> Vec<ListingObservation> {
        let mut latest: HashMap<&str, &ListingObservation> = HashMap::new();
        // Observations are date-ordered, so later entries overwrite earlier ones.
        for obs in &self.observations {
            latest.insert(obs.house_id.as_str(), obs);
        }
        let mut out: Vec<ListingObservation> = latest.into_values().cloned().collect();
        out.sort_by(|a, b| a.house_id.cmp(&b.house_id));
        out
    }
}

fn validate_observation(obs: &ListingObservation) -> Result<(), ValuationError> {
    let numeric = [
        ("sqft", obs.sqft),
        ("beds", obs.beds),
        ("baths", obs.baths),
        ("recurring_fee", obs.recurring_fee),
        ("price", obs.price),
    ];
    for (name, value) in numeric {
        if !value.is_finite() {
            return Err(ValuationError::InvalidData(format!(
                "{}: non-finite {} ({})",
                obs.house_id, name, value
            )));
        }
    }
    Ok(())
}

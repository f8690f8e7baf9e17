//! Synthetic Tampa sale history with neighborhood price levels, per-neighborhood
//! appreciation and a small share of deliberately discounted recent listings.

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use serde::Serialize;
use statrs::distribution::Normal;
use std::io::Write;

const LAT_BOUNDS: (f64, f64) = (27.8, 28.1);
const LONG_BOUNDS: (f64, f64) = (-82.6, -82.3);

const STREETS: &[&str] = &[
    "Bayshore Blvd", "Kennedy Blvd", "Dale Mabry Hwy", "Nebraska Ave",
    "Florida Ave", "Hyde Park Ave", "Howard Ave", "MacDill Ave",
    "Gandy Blvd", "Fowler Ave", "Busch Blvd", "Ybor St", "Seventh Ave",
    "Westshore Blvd", "Hillsborough Ave", "Bearss Ave", "Bruce B Downs Blvd",
];

const NEIGHBORHOOD_NAMES: &[&str] = &[
    "South Tampa", "Ybor City", "Hyde Park", "Seminole Heights",
    "Westchase", "New Tampa", "Carrollwood", "Brandon",
    "Temple Terrace", "Town 'n' Country",
];

/// Base Tampa price per square foot before the neighborhood multiplier.
const BASE_PRICE_PER_SQFT: f64 = 220.0;
/// Units this small sell at a per-sqft premium.
const SMALL_UNIT_SQFT: f64 = 1000.0;
const SMALL_UNIT_PREMIUM: f64 = 1.2;
const MIN_SQFT: f64 = 450.0;

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub num_houses: usize,
    pub num_neighborhoods: usize,
    pub history_days: i64,
    pub seed: u64,
    pub hoa_probability: f64,
    /// Share of houses whose latest listing is discounted 20-35%.
    pub gem_fraction: f64,
    /// Last day of the generated history.
    pub end_date: NaiveDate,
}

impl GeneratorConfig {
    pub fn new(end_date: NaiveDate) -> Self {
        Self {
            num_houses: 1000,
            num_neighborhoods: 10,
            history_days: 365,
            seed: 42,
            hoa_probability: 0.7,
            gem_fraction: 0.015,
            end_date,
        }
    }
}

#[derive(Debug, Clone)]
struct Neighborhood {
    id: i64,
    name: String,
    lat: f64,
    long: f64,
    quality_multiplier: f64,
    /// Linear appreciation per day.
    appreciation_rate: f64,
}

/// One CSV row. Field order is the column order.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub house_id: String,
    pub address: String,
    pub neighborhood_id: i64,
    pub neighborhood_name: String,
    pub lat: f64,
    pub long: f64,
    pub sqft: f64,
    pub beds: u32,
    pub baths: u32,
    pub hoa_fee: f64,
    pub date: NaiveDate,
    pub price: f64,
    pub is_undervalued: bool,
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn neighborhoods(rng: &mut StdRng, count: usize) -> Vec<Neighborhood> {
    (0..count)
        .map(|i| Neighborhood {
            id: i as i64,
            name: NEIGHBORHOOD_NAMES
                .get(i)
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("Neighborhood {i}")),
            lat: rng.gen_range(LAT_BOUNDS.0..LAT_BOUNDS.1),
            long: rng.gen_range(LONG_BOUNDS.0..LONG_BOUNDS.1),
            quality_multiplier: rng.gen_range(1.0..2.5),
            appreciation_rate: rng.gen_range(0.00015..0.0004),
        })
        .collect()
}

/// Generate the full history. Same config, same rows.
pub fn generate(config: &GeneratorConfig) -> anyhow::Result<Vec<Record>> {
    anyhow::ensure!(config.num_houses > 0, "num_houses must be > 0");
    anyhow::ensure!(config.num_neighborhoods > 0, "num_neighborhoods must be > 0");
    anyhow::ensure!(config.history_days > 0, "history_days must be > 0");

    let mut rng = StdRng::seed_from_u64(config.seed);
    let sqft_dist = Normal::new(1800.0, 800.0)?;
    let jitter = Normal::new(0.0, 0.015)?;
    let start_date = config.end_date - Duration::days(config.history_days);

    let hoods = neighborhoods(&mut rng, config.num_neighborhoods);
    let mut records = Vec::with_capacity(config.num_houses * 3);
    // Index range of each house's rows, in date order.
    let mut house_rows = Vec::with_capacity(config.num_houses);

    for i in 0..config.num_houses {
        let nb = hoods
            .choose(&mut rng)
            .ok_or_else(|| anyhow::anyhow!("no neighborhoods"))?;

        let sqft = rng.sample(sqft_dist).max(MIN_SQFT).round();
        let beds = ((sqft / 600.0) as u32 + rng.gen_range(0..2)).max(1);
        let baths = ((beds as f64 * 0.7 + rng.gen_range(0.0..1.0)) as u32).max(1);

        let sqft_premium = if sqft > SMALL_UNIT_SQFT { 1.0 } else { SMALL_UNIT_PREMIUM };
        let initial_price = sqft
            * BASE_PRICE_PER_SQFT
            * nb.quality_multiplier
            * sqft_premium
            * rng.gen_range(0.85..1.15);

        let house_id = format!("TPA{i:04}");
        let address = format!(
            "{} {}",
            rng.gen_range(100..9999),
            STREETS.choose(&mut rng).copied().unwrap_or("Kennedy Blvd")
        );

        let hoa_fee = if rng.gen_bool(config.hoa_probability) {
            50.0 * nb.quality_multiplier + rng.gen_range(0.0..300.0)
        } else {
            0.0
        };

        let lat = nb.lat + rng.sample(jitter);
        let long = nb.long + rng.sample(jitter);

        let num_events = rng.gen_range(2..=4);
        let mut offsets: Vec<i64> = (0..num_events)
            .map(|_| rng.gen_range(0..config.history_days))
            .collect();
        offsets.sort_unstable();

        let first = records.len();
        for days_passed in offsets {
            let market_price = initial_price * (1.0 + nb.appreciation_rate * days_passed as f64);
            let listing_price = market_price * rng.gen_range(0.97..1.03);
            records.push(Record {
                house_id: house_id.clone(),
                address: address.clone(),
                neighborhood_id: nb.id,
                neighborhood_name: nb.name.clone(),
                lat: round_to(lat, 6),
                long: round_to(long, 6),
                sqft,
                beds,
                baths,
                hoa_fee: round_to(hoa_fee, 2),
                date: start_date + Duration::days(days_passed),
                price: round_to(listing_price, 2),
                is_undervalued: false,
            });
        }
        house_rows.push(first..records.len());
    }

    let gem_count = ((config.num_houses as f64 * config.gem_fraction) as usize).max(1);
    for house in index::sample(&mut rng, config.num_houses, gem_count) {
        let latest = house_rows[house].end - 1;
        let discount = rng.gen_range(0.65..0.8);
        let row = &mut records[latest];
        row.price = round_to(row.price * discount, 2);
        row.is_undervalued = true;
    }

    tracing::debug!(
        "Generated {} rows for {} houses ({} gems)",
        records.len(),
        config.num_houses,
        gem_count
    );
    Ok(records)
}

pub fn write_csv<W: Write>(records: &[Record], writer: W) -> anyhow::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for record in records {
        csv_writer.serialize(record)?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use valuation_engine::HistoricalCorpus;

    fn config() -> GeneratorConfig {
        GeneratorConfig::new(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
    }

    fn rows_per_house(records: &[Record]) -> HashMap<&str, Vec<&Record>> {
        let mut map: HashMap<&str, Vec<&Record>> = HashMap::new();
        for r in records {
            map.entry(r.house_id.as_str()).or_default().push(r);
        }
        map
    }

    #[test]
    fn test_same_seed_same_output() {
        let a = generate(&config()).unwrap();
        let b = generate(&config()).unwrap();
        assert_eq!(a.len(), b.len());
        assert!(a.iter().zip(&b).all(|(x, y)| x.house_id == y.house_id
            && x.price.to_bits() == y.price.to_bits()
            && x.date == y.date));
    }

    #[test]
    fn test_shape_of_history() {
        let cfg = config();
        let records = generate(&cfg).unwrap();
        let houses = rows_per_house(&records);
        assert_eq!(houses.len(), 1000);
        assert!(houses.values().all(|rows| (2..=4).contains(&rows.len())));

        let start = cfg.end_date - Duration::days(cfg.history_days);
        assert!(records.iter().all(|r| r.date >= start && r.date < cfg.end_date));
        assert!(records.iter().all(|r| r.sqft >= MIN_SQFT && r.beds >= 1 && r.baths >= 1));
        assert!(records.iter().all(|r| (0..10).contains(&r.neighborhood_id)));

        let with_hoa = houses.values().filter(|rows| rows[0].hoa_fee > 0.0).count();
        assert!((600..=800).contains(&with_hoa), "hoa houses: {with_hoa}");
    }

    #[test]
    fn test_gems_are_latest_and_discounted() {
        let records = generate(&config()).unwrap();
        let houses = rows_per_house(&records);
        let gems: Vec<&Record> = records.iter().filter(|r| r.is_undervalued).collect();
        assert_eq!(gems.len(), 15);

        for gem in gems {
            let rows = &houses[gem.house_id.as_str()];
            let latest = rows.iter().map(|r| r.date).max().unwrap();
            assert_eq!(gem.date, latest);
            let earlier = rows.iter().find(|r| !r.is_undervalued).unwrap();
            assert!(gem.price < earlier.price);
        }
    }

    #[test]
    fn test_csv_loads_as_corpus() {
        let cfg = GeneratorConfig {
            num_houses: 50,
            ..config()
        };
        let records = generate(&cfg).unwrap();
        let mut buf = Vec::new();
        write_csv(&records, &mut buf).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with(
            "house_id,address,neighborhood_id,neighborhood_name,lat,long,sqft,beds,baths,hoa_fee,date,price,is_undervalued"
        ));

        let corpus = HistoricalCorpus::from_reader(buf.as_slice()).unwrap();
        assert_eq!(corpus.len(), records.len());
        assert_eq!(corpus.house_count(), 50);
    }
}

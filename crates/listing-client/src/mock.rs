use chrono::NaiveDate;

use valuation_core::ListingObservation;

use crate::models::neighborhood_id_for_zip;

struct MockRow {
    id: &'static str,
    address: &'static str,
    zip: &'static str,
    lat: f64,
    long: f64,
    sqft: f64,
    beds: f64,
    baths: f64,
    hoa_fee: f64,
    price: f64,
}

const ROWS: &[MockRow] = &[
    // South Tampa / Bayshore
    MockRow { id: "TPA_REAL_001", address: "2207 S Carolina Ave #30", zip: "33629", lat: 27.9252, long: -82.4851, sqft: 955.0, beds: 1.0, baths: 1.0, hoa_fee: 563.0, price: 249_900.0 },
    MockRow { id: "TPA_REAL_002", address: "3702 W San Luis St", zip: "33629", lat: 27.9155, long: -82.5052, sqft: 2863.0, beds: 4.0, baths: 4.0, hoa_fee: 0.0, price: 1_629_000.0 },
    MockRow { id: "TPA_REAL_003", address: "3507 Bayshore Blvd #1202", zip: "33629", lat: 27.9102, long: -82.4905, sqft: 2752.0, beds: 3.0, baths: 4.0, hoa_fee: 880.0, price: 2_750_000.0 },
    MockRow { id: "TPA_REAL_004", address: "3808 W Barcelona St", zip: "33629", lat: 27.9182, long: -82.5061, sqft: 2750.0, beds: 4.0, baths: 4.0, hoa_fee: 0.0, price: 2_100_000.0 },
    MockRow { id: "TPA_REAL_005", address: "3105 S Ysabella Ave #1803", zip: "33629", lat: 27.9121, long: -82.4922, sqft: 2429.0, beds: 2.0, baths: 3.0, hoa_fee: 1029.0, price: 2_450_000.0 },
    // East Tampa / Brandon / Seffner
    MockRow { id: "TPA_REAL_006", address: "1244 Florablu Dr, Seffner", zip: "33584", lat: 27.9942, long: -82.2612, sqft: 1886.0, beds: 4.0, baths: 2.0, hoa_fee: 57.0, price: 500_000.0 },
    MockRow { id: "TPA_REAL_007", address: "6605 24th Ave S", zip: "33619", lat: 27.9312, long: -82.3811, sqft: 2025.0, beds: 4.0, baths: 2.0, hoa_fee: 0.0, price: 529_900.0 },
    // Urban / North Tampa
    MockRow { id: "TPA_REAL_008", address: "4611 W North B St APT 238", zip: "33609", lat: 27.9482, long: -82.5111, sqft: 560.0, beds: 1.0, baths: 1.0, hoa_fee: 412.0, price: 160_000.0 },
    MockRow { id: "TPA_REAL_009", address: "4613 N Country Hills Ct", zip: "33566", lat: 28.0282, long: -82.1221, sqft: 1305.0, beds: 3.0, baths: 2.0, hoa_fee: 25.0, price: 345_000.0 },
    MockRow { id: "TPA_REAL_010", address: "8788 56th Way N", zip: "33781", lat: 27.8512, long: -82.7111, sqft: 1533.0, beds: 3.0, baths: 2.0, hoa_fee: 0.0, price: 364_990.0 },
];

/// Fixed batch of Tampa listings used when the provider is unavailable.
pub fn mock_listings(observed_at: NaiveDate) -> Vec<ListingObservation> {
    ROWS.iter()
        .map(|r| ListingObservation {
            house_id: r.id.to_string(),
            address: r.address.to_string(),
            neighborhood_id: neighborhood_id_for_zip(r.zip),
            neighborhood_name: r.zip.to_string(),
            sqft: r.sqft,
            beds: r.beds,
            baths: r.baths,
            recurring_fee: r.hoa_fee,
            observed_at,
            price: r.price,
            property_type: None,
            days_on_market: None,
            year_built: None,
            latitude: Some(r.lat),
            longitude: Some(r.long),
            description: None,
        })
        .collect()
}

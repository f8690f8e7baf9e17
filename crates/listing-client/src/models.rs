use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use valuation_core::ListingObservation;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HoaInfo {
    pub fee: Option<f64>,
}

/// One sale listing as returned by `/listings/sale`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleListing {
    pub id: Option<String>,
    pub formatted_address: Option<String>,
    pub address_line1: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub square_footage: Option<f64>,
    pub bedrooms: Option<f64>,
    pub bathrooms: Option<f64>,
    pub hoa: Option<HoaInfo>,
    pub hoa_fee: Option<f64>,
    pub price: Option<f64>,
    pub property_type: Option<String>,
    pub days_on_market: Option<u32>,
    pub year_built: Option<i32>,
    pub description: Option<String>,
    pub status: Option<String>,
}

impl SaleListing {
    /// Monthly HOA fee, preferring the nested `hoa.fee` field.
    pub fn monthly_fee(&self) -> f64 {
        self.hoa
            .as_ref()
            .and_then(|h| h.fee)
            .or(self.hoa_fee)
            .filter(|f| f.is_finite() && *f > 0.0)
            .unwrap_or(0.0)
    }

    pub fn address(&self) -> Option<String> {
        self.formatted_address
            .clone()
            .or_else(|| self.address_line1.clone())
            .filter(|a| !a.trim().is_empty())
    }
}

/// Stable neighborhood id for a zip code: the numeric zip itself, or an
/// FNV-1a hash for non-numeric postal codes.
pub fn neighborhood_id_for_zip(zip: &str) -> i64 {
    let trimmed = zip.trim();
    let five: String = trimmed.chars().take(5).collect();
    if five.len() == 5 && five.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(id) = five.parse::<i64>() {
            return id;
        }
    }
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in trimmed.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (hash % 1_000_000) as i64
}

/// Convert a provider listing into an observation dated `observed_at`.
/// Listings without an id or price are dropped.
pub fn normalize(listing: SaleListing, observed_at: NaiveDate) -> Option<ListingObservation> {
    let house_id = listing.id.clone().filter(|id| !id.trim().is_empty())?;
    let price = listing.price.filter(|p| p.is_finite() && *p >= 0.0)?;
    let zip = listing.zip_code.clone().unwrap_or_default();
    let recurring_fee = listing.monthly_fee();
    let address = listing.address().unwrap_or_else(|| house_id.clone());

    Some(ListingObservation {
        house_id,
        address,
        neighborhood_id: neighborhood_id_for_zip(&zip),
        neighborhood_name: zip,
        sqft: listing.square_footage.unwrap_or(0.0),
        beds: listing.bedrooms.unwrap_or(0.0),
        baths: listing.bathrooms.unwrap_or(0.0),
        recurring_fee,
        observed_at,
        price,
        property_type: listing.property_type,
        days_on_market: listing.days_on_market,
        year_built: listing.year_built,
        latitude: listing.latitude,
        longitude: listing.longitude,
        description: listing.description,
    })
}

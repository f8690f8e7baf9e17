use valuation_core::ListingObservation;

pub const SYSTEM_PROMPT: &str = r#"You are an expert real estate investor and home inspector.
Analyze the property metadata, especially the listing description, and judge whether the home is
likely turnkey or carries hidden condition or repair risk that the listed price does not reflect.
Phrases such as "TLC", "investor special", "as-is", "cash only", or an old build year with no
mention of updates indicate higher risk.

Express the risk as a multiplier on the estimated fair value between 0.5 and 1.0:
1.0 means no discount (turnkey), 0.5 means the home is worth half the estimate after repairs.

Respond strictly with a JSON object in the following format:
{
    "risk_multiplier": 0.9,
    "reasoning": "A concise one-sentence explanation."
}"#;

fn or_unknown<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "Unknown".to_string())
}

pub fn user_prompt(listing: &ListingObservation) -> String {
    format!(
        "Please evaluate the following property for hidden risk / condition issues:\n\
         - Address: {}\n\
         - Area/Zip: {}\n\
         - Property Type: {}\n\
         - Asking Price: ${:.0}\n\
         - Sqft: {:.0}\n\
         - Beds/Baths: {}/{}\n\
         - Year Built: {}\n\
         - Days on Market: {}\n\
         - HOA Fee: ${:.0}/mo\n\
         - Public Description: {}\n",
        listing.address,
        listing.neighborhood_name,
        or_unknown(listing.property_type.as_deref()),
        listing.price,
        listing.sqft,
        listing.beds,
        listing.baths,
        or_unknown(listing.year_built),
        or_unknown(listing.days_on_market),
        listing.recurring_fee,
        listing
            .description
            .as_deref()
            .unwrap_or("Not provided"),
    )
}

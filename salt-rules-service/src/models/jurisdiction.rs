//! US jurisdiction table: the 50 states plus DC.

/// Sorted two-letter codes for the 51 SALT jurisdictions.
const STATE_CODES: &[&str] = &[
    "AK", "AL", "AR", "AZ", "CA", "CO", "CT", "DC", "DE", "FL", "GA", "HI", "IA", "ID", "IL",
    "IN", "KS", "KY", "LA", "MA", "MD", "ME", "MI", "MN", "MO", "MS", "MT", "NC", "ND", "NE",
    "NH", "NJ", "NM", "NV", "NY", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT",
    "VA", "VT", "WA", "WI", "WV", "WY",
];

/// Whether `code` names a known jurisdiction (case-insensitive).
pub fn is_valid_state(code: &str) -> bool {
    let upper = code.trim().to_uppercase();
    STATE_CODES.binary_search(&upper.as_str()).is_ok()
}

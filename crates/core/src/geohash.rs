//! Geohash string checks. Proximity is a shared prefix, nothing more.

pub const ALPHABET: &str = "0123456789bcdefghjkmnpqrstuvwxyz";

/// Length of the shared prefix that counts as "nearby" (a cell of roughly
/// 20 km by 20 km).
pub const PROXIMITY_PREFIX_LEN: usize = 4;

pub const REPORT_MIN_LEN: usize = 6;
pub const MAX_LEN: usize = 12;

/// True when every character belongs to the geohash base32 alphabet.
pub fn is_valid(geohash: &str) -> bool {
    !geohash.is_empty() && geohash.chars().all(|c| ALPHABET.contains(c))
}

pub fn is_valid_len(geohash: &str, min: usize) -> bool {
    is_valid(geohash) && (min..=MAX_LEN).contains(&geohash.len())
}

/// Looser check for subscriber cells: lowercase ASCII alphanumerics only.
/// Subscriptions are matched by prefix and never decoded, so the stricter
/// alphabet is not enforced for them.
pub fn is_cell_len(geohash: &str, min: usize) -> bool {
    (min..=MAX_LEN).contains(&geohash.len())
        && geohash
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
}

/// The prefix used to match subscriptions near a report, if the geohash is
/// long enough to have one.
pub fn proximity_prefix(geohash: &str) -> Option<&str> {
    if !is_valid(geohash) {
        return None;
    }
    geohash.get(..PROXIMITY_PREFIX_LEN)
}

//! External ID derivation
//!
//! Every entity in the capture store is addressed by a stable external id
//! derived from its business key, so re-running a load upserts the same
//! nodes instead of creating new ones.

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the SHA-256 digest (96 bits).
pub const EXTERNAL_ID_LEN: usize = 24;

/// Derive the external id for `(key, category, date)`.
///
/// Hashes `"{key}_{category}_{date}"` with SHA-256 and keeps the first
/// 12 bytes as lowercase hex. Pass an empty `date` for entities that are
/// not date-specific (emissions container, emission type).
pub fn derive_external_id(key: &str, category: &str, date: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.update(b"_");
    hasher.update(category.as_bytes());
    hasher.update(b"_");
    hasher.update(date.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..EXTERNAL_ID_LEN / 2])
}

/// External id of the singleton `Emissions` node under a well.
pub fn emissions_id(well_key: &str) -> String {
    derive_external_id(well_key, "emissions", "")
}

/// External id of the `EmissionType` node for one well and type name.
pub fn emission_type_id(well_key: &str, type_name: &str) -> String {
    derive_external_id(well_key, &format!("emission_type_{}", type_name), "")
}

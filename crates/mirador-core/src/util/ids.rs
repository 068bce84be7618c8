//! Item identifier derivation.
//!
//! Vector stores address points by integer id. Mirador derives that id from
//! the caller's content key so that re-ingesting a key lands on the same
//! slot (upsert, not append).
//!
//! The id is the first eight bytes of the key's BLAKE3 digest, read
//! little-endian and reduced into `[0, 2^ITEM_ID_BITS)`. It is stable across
//! processes, platforms and releases.
//!
//! # Collisions
//!
//! Two distinct keys can reduce to the same id. The second ingestion then
//! silently replaces the first item. This is a known limitation of the 31-bit
//! id space, kept for compatibility with existing collections.

/// Width of the identifier space in bits.
pub const ITEM_ID_BITS: u32 = 31;

const ITEM_ID_MODULUS: u64 = 1 << ITEM_ID_BITS;

/// Derive the store identifier for a content key.
///
/// # Example
///
/// ```
/// use mirador_core::item_id;
///
/// let id = item_id("3f2a9c");
/// assert_eq!(id, item_id("3f2a9c"));
/// assert!(u64::from(id) < 1 << 31);
/// ```
pub fn item_id(content_key: &str) -> u32 {
    let digest = blake3::hash(content_key.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    // Fits in u32 because the modulus is 2^31.
    (u64::from_le_bytes(prefix) % ITEM_ID_MODULUS) as u32
}

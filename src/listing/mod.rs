//! Listings: the value types callers work with and their store mapping.
//!
//! A listing lives in the store as one hash at `{key_prefix}{id}`. The
//! conversion between [`Listing`] and the hash happens only here, at the
//! store boundary; the rest of the crate never touches raw field bytes.

pub mod types;
pub(crate) mod validation;

pub use types::{Listing, ListingSummary, ListingUpdate, NewListing, UpdateOutcome};

/// Hash field names of a stored listing.
pub mod fields {
    /// Listing identifier (duplicated from the key for convenience).
    pub const ID: &str = "id";
    /// Free-text title.
    pub const TITLE: &str = "title";
    /// Free-text description.
    pub const DESCRIPTION: &str = "description";
    /// Nightly price as a decimal string.
    pub const PRICE: &str = "price";
    /// Image URL.
    pub const IMAGE_URL: &str = "imageUrl";
    /// Packed embedding blob.
    pub const VECTOR: &str = "vector";
}

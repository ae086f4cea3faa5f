//! Listing value types and the hash mapping.

use serde::{Deserialize, Serialize};

use super::fields;
use crate::error::{Result, StorageError};
use crate::index::{HashFields, SearchHit};
use crate::types::ListingId;
use crate::vector::pack_vector;

/// A stored lodging listing.
///
/// Carries no embedding: the vector is written once at creation
/// and only ever read by the index.
#[derive(Clone, Debug, PartialEq)]
pub struct Listing {
    /// Unique identifier, immutable after creation.
    pub id: ListingId,
    /// Searchable title.
    pub title: String,
    /// Searchable description.
    pub description: String,
    /// Nightly price, finite and non-negative.
    pub price: f64,
    /// Image URL (the configured placeholder when none was given).
    pub image_url: String,
}

impl Listing {
    /// Text the listing's embedding is computed from.
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }

    /// Converts the listing and its embedding into store hash fields.
    pub(crate) fn to_hash(&self, vector: &[f32]) -> HashFields {
        let mut hash = HashFields::new();
        hash.insert(fields::ID.into(), self.id.as_str().as_bytes().to_vec());
        hash.insert(fields::TITLE.into(), self.title.as_bytes().to_vec());
        hash.insert(fields::DESCRIPTION.into(), self.description.as_bytes().to_vec());
        hash.insert(fields::PRICE.into(), self.price.to_string().into_bytes());
        hash.insert(fields::IMAGE_URL.into(), self.image_url.as_bytes().to_vec());
        hash.insert(fields::VECTOR.into(), pack_vector(vector));
        hash
    }

    /// Rebuilds a listing from its stored hash.
    ///
    /// `id` is used when the hash carries no `id` field. Missing text fields
    /// read as empty strings.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Corrupted` if `price` is missing or not a
    /// number.
    pub(crate) fn from_hash(id: &str, hash: &HashFields) -> Result<Self> {
        let price = text_field(hash, fields::PRICE)
            .and_then(parse_price)
            .ok_or_else(|| {
                StorageError::corrupted(format!("listing '{}' has no valid price", id))
            })?;

        Ok(Self {
            id: ListingId::new(text_field(hash, fields::ID).unwrap_or(id)),
            title: text_field(hash, fields::TITLE).unwrap_or_default().to_string(),
            description: text_field(hash, fields::DESCRIPTION)
                .unwrap_or_default()
                .to_string(),
            price,
            image_url: text_field(hash, fields::IMAGE_URL)
                .unwrap_or_default()
                .to_string(),
        })
    }
}

/// Input for creating a listing.
#[derive(Clone, Debug, PartialEq)]
pub struct NewListing {
    /// Caller-chosen identifier; must not already exist.
    pub id: ListingId,
    /// Title (required, non-empty).
    pub title: String,
    /// Description (may be empty).
    pub description: String,
    /// Nightly price (finite, non-negative).
    pub price: f64,
    /// Image URL; `None` stores the configured placeholder.
    pub image_url: Option<String>,
}

impl NewListing {
    /// Creates input without an image URL.
    pub fn new(
        id: impl Into<ListingId>,
        title: impl Into<String>,
        description: impl Into<String>,
        price: f64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            price,
            image_url: None,
        }
    }

    /// Sets the image URL.
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

/// Partial update of a listing. `None` fields are left unchanged.
///
/// The id and the embedding cannot be changed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListingUpdate {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New price.
    pub price: Option<f64>,
    /// New image URL.
    pub image_url: Option<String>,
}

impl ListingUpdate {
    /// Returns true if no field is supplied.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.image_url.is_none()
    }

    /// Returns the supplied fields as hash fields.
    pub(crate) fn to_hash(&self) -> HashFields {
        let mut hash = HashFields::new();
        if let Some(title) = &self.title {
            hash.insert(fields::TITLE.into(), title.as_bytes().to_vec());
        }
        if let Some(description) = &self.description {
            hash.insert(fields::DESCRIPTION.into(), description.as_bytes().to_vec());
        }
        if let Some(price) = self.price {
            hash.insert(fields::PRICE.into(), price.to_string().into_bytes());
        }
        if let Some(url) = &self.image_url {
            hash.insert(fields::IMAGE_URL.into(), url.as_bytes().to_vec());
        }
        hash
    }
}

/// Result of [`update_listing`](crate::LodgingService::update_listing).
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateOutcome {
    /// The listing was updated; carries the merged record.
    Updated(Listing),
    /// No listing with that id exists.
    NotFound,
    /// The update supplied no fields; nothing was written.
    NoChanges,
}

impl UpdateOutcome {
    /// Returns the updated listing, if any.
    pub fn listing(&self) -> Option<&Listing> {
        match self {
            Self::Updated(listing) => Some(listing),
            _ => None,
        }
    }
}

/// One search result.
///
/// Also the cached form of semantic search results, hence `Serialize`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListingSummary {
    /// Store key of the listing.
    pub key: String,
    /// Listing identifier.
    pub id: String,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Price (0 when the stored value is unreadable).
    pub price: f64,
    /// Image URL.
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    /// Cosine distance for semantic results, `None` for keyword results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl ListingSummary {
    /// Builds a summary from an index hit.
    ///
    /// `id` comes from the hit's `id` field, else from the key with
    /// `key_prefix` removed.
    pub(crate) fn from_hit(hit: SearchHit, key_prefix: &str) -> Self {
        let id = hit
            .field_str(fields::ID)
            .or_else(|| hit.key.strip_prefix(key_prefix))
            .unwrap_or(hit.key.as_str())
            .to_string();
        let text = |name: &str| hit.field_str(name).unwrap_or_default().to_string();

        Self {
            id,
            title: text(fields::TITLE),
            description: text(fields::DESCRIPTION),
            price: hit
                .field_str(fields::PRICE)
                .and_then(parse_price)
                .unwrap_or(0.0),
            image_url: text(fields::IMAGE_URL),
            score: hit.distance,
            key: hit.key,
        }
    }
}

fn text_field<'a>(hash: &'a HashFields, name: &str) -> Option<&'a str> {
    hash.get(name)
        .and_then(|bytes| std::str::from_utf8(bytes).ok())
}

fn parse_price(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|p| p.is_finite())
}

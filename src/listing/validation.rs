//! Input validation for listings.
//!
//! Runs before any store write, so a rejected input leaves no trace.
//!
//! ```text
//! LodgingService::create_listing()
//!     ├── validate_new_listing()     ← field rules
//!     ├── duplicate-id check         ← needs the store
//!     └── store write                ← only reached if valid
//! ```

use crate::error::{LodgingError, ValidationError};
use crate::listing::types::{ListingUpdate, NewListing};

/// Validates a [`NewListing`].
///
/// # Rules
///
/// | Field | Constraint |
/// |-------|------------|
/// | `id` | Non-blank |
/// | `title` | Non-blank |
/// | `price` | Finite, ≥ 0 |
/// | `image_url` | Non-blank when supplied |
pub(crate) fn validate_new_listing(listing: &NewListing) -> Result<(), LodgingError> {
    if listing.id.is_blank() {
        return Err(ValidationError::required_field("id").into());
    }

    validate_title(&listing.title)?;
    validate_price(listing.price)?;

    if let Some(url) = &listing.image_url {
        validate_image_url(url)?;
    }

    Ok(())
}

/// Validates the supplied fields of a [`ListingUpdate`].
///
/// Same rules as creation, applied only to fields that are `Some`.
pub(crate) fn validate_listing_update(update: &ListingUpdate) -> Result<(), LodgingError> {
    if let Some(title) = &update.title {
        validate_title(title)?;
    }
    if let Some(price) = update.price {
        validate_price(price)?;
    }
    if let Some(url) = &update.image_url {
        validate_image_url(url)?;
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<(), LodgingError> {
    if title.trim().is_empty() {
        return Err(ValidationError::required_field("title").into());
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<(), LodgingError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ValidationError::invalid_field(
            "price",
            format!("must be a finite number >= 0, got {}", price),
        )
        .into());
    }
    Ok(())
}

fn validate_image_url(url: &str) -> Result<(), LodgingError> {
    if url.trim().is_empty() {
        return Err(ValidationError::invalid_field(
            "image_url",
            "must not be blank when supplied",
        )
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> NewListing {
        NewListing::new("L1", "Loft", "Bright loft", 100.0)
    }

    #[test]
    fn test_valid_listing_passes() {
        assert!(validate_new_listing(&valid()).is_ok());
        assert!(validate_new_listing(&valid().with_image_url("http://x")).is_ok());
    }

    #[test]
    fn test_free_listing_is_valid() {
        let listing = NewListing {
            price: 0.0,
            ..valid()
        };
        assert!(validate_new_listing(&listing).is_ok());
    }

    #[test]
    fn test_blank_id_rejected() {
        let listing = NewListing {
            id: "  ".into(),
            ..valid()
        };
        let err = validate_new_listing(&listing).unwrap_err();
        assert!(matches!(
            err,
            LodgingError::Validation(ValidationError::RequiredField { ref field }) if field == "id"
        ));
    }

    #[test]
    fn test_blank_title_rejected() {
        let listing = NewListing {
            title: String::new(),
            ..valid()
        };
        assert!(validate_new_listing(&listing).unwrap_err().is_validation());
    }

    #[test]
    fn test_bad_prices_rejected() {
        for price in [-1.0, f64::NAN, f64::INFINITY] {
            let listing = NewListing { price, ..valid() };
            assert!(validate_new_listing(&listing).unwrap_err().is_validation());
        }
    }

    #[test]
    fn test_update_validates_only_supplied_fields() {
        assert!(validate_listing_update(&ListingUpdate::default()).is_ok());

        let update = ListingUpdate {
            description: Some(String::new()),
            ..Default::default()
        };
        assert!(validate_listing_update(&update).is_ok());

        let update = ListingUpdate {
            price: Some(-5.0),
            ..Default::default()
        };
        assert!(validate_listing_update(&update).unwrap_err().is_validation());

        let update = ListingUpdate {
            title: Some(" ".into()),
            ..Default::default()
        };
        assert!(validate_listing_update(&update).unwrap_err().is_validation());
    }
}

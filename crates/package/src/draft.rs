//! Immutable package draft.
//!
//! Every edit returns a new [`PackageDraft`]; the previous value is never
//! touched, so an image merge arriving after a field edit cannot undo it.

use packdesk_protocol::{MAX_IMAGES_PER_PACKAGE, PackageRecord};

use crate::error::ValidationError;

/// A single typed edit to one form field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldEdit {
    Name(String),
    Description(String),
    Destination(String),
    Days(u32),
    Nights(u32),
    Accommodation(String),
    Transportation(String),
    Meals(String),
    Activities(String),
    Price(f64),
    DiscountPrice(f64),
    Offer(bool),
}

/// Snapshot of the package being edited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageDraft {
    record: PackageRecord,
}

impl From<PackageRecord> for PackageDraft {
    fn from(record: PackageRecord) -> Self {
        Self { record }
    }
}

impl PackageDraft {
    pub fn record(&self) -> &PackageRecord {
        &self.record
    }

    pub fn into_record(self) -> PackageRecord {
        self.record
    }

    pub fn images(&self) -> &[String] {
        &self.record.package_images
    }

    pub fn image_count(&self) -> usize {
        self.record.package_images.len()
    }

    /// Returns a draft with `edit` applied.
    pub fn apply(&self, edit: FieldEdit) -> Self {
        let mut record = self.record.clone();
        match edit {
            FieldEdit::Name(v) => record.package_name = v,
            FieldEdit::Description(v) => record.package_description = v,
            FieldEdit::Destination(v) => record.package_destination = v,
            FieldEdit::Days(v) => record.package_days = v,
            FieldEdit::Nights(v) => record.package_nights = v,
            FieldEdit::Accommodation(v) => record.package_accommodation = v,
            FieldEdit::Transportation(v) => record.package_transportation = v,
            FieldEdit::Meals(v) => record.package_meals = v,
            FieldEdit::Activities(v) => record.package_activities = v,
            FieldEdit::Price(v) => record.package_price = v,
            FieldEdit::DiscountPrice(v) => record.package_discount_price = v,
            FieldEdit::Offer(v) => record.package_offer = v,
        }
        Self { record }
    }

    /// Returns a draft with `urls` appended after the existing images.
    pub fn with_images_appended(&self, urls: &[String]) -> Self {
        let mut record = self.record.clone();
        record.package_images.extend_from_slice(urls);
        Self { record }
    }

    /// Returns a draft without the image at `index`. Out of range is a no-op.
    pub fn without_image(&self, index: usize) -> Self {
        let mut record = self.record.clone();
        if index < record.package_images.len() {
            record.package_images.remove(index);
        }
        Self { record }
    }

    /// Checks the draft in the order the form reports problems.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let r = &self.record;
        let required = [
            ("Name", &r.package_name),
            ("Description", &r.package_description),
            ("Destination", &r.package_destination),
            ("Accommodation", &r.package_accommodation),
            ("Transportation", &r.package_transportation),
            ("Meals", &r.package_meals),
            ("Activities", &r.package_activities),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(ValidationError::MissingField(*field));
        }
        if !r.package_price.is_finite() {
            return Err(ValidationError::InvalidAmount { field: "Price" });
        }
        if r.package_price == 0.0 {
            return Err(ValidationError::MissingPrice);
        }
        if r.package_price < 0.0 {
            return Err(ValidationError::NegativePrice(r.package_price));
        }
        if r.package_offer && !r.package_discount_price.is_finite() {
            return Err(ValidationError::InvalidAmount {
                field: "Discount Price",
            });
        }
        if r.package_offer && r.package_discount_price >= r.package_price {
            return Err(ValidationError::DiscountNotBelowPrice {
                price: r.package_price,
                discount: r.package_discount_price,
            });
        }
        if r.package_days < 1 {
            return Err(ValidationError::InvalidDuration { field: "Days" });
        }
        if r.package_nights < 1 {
            return Err(ValidationError::InvalidDuration { field: "Nights" });
        }
        if r.package_images.len() > MAX_IMAGES_PER_PACKAGE {
            return Err(ValidationError::TooManyImages {
                count: r.package_images.len(),
                max: MAX_IMAGES_PER_PACKAGE,
            });
        }
        Ok(())
    }

    /// Validates and returns the record to send.
    ///
    /// A package without an offer is always sent with a zero discount.
    pub fn prepare_for_submit(&self) -> Result<PackageRecord, ValidationError> {
        self.validate()?;
        let mut record = self.record.clone();
        if !record.package_offer {
            record.package_discount_price = 0.0;
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_record() -> PackageRecord {
        PackageRecord {
            package_name: "Goa Getaway".into(),
            package_description: "Beaches and forts".into(),
            package_destination: "Goa".into(),
            package_days: 4,
            package_nights: 3,
            package_accommodation: "Resort".into(),
            package_transportation: "Flight".into(),
            package_meals: "Breakfast".into(),
            package_activities: "Snorkelling".into(),
            package_price: 500.0,
            package_discount_price: 0.0,
            package_offer: false,
            package_images: vec!["https://cdn.test/a.jpg".into()],
        }
    }

    fn draft() -> PackageDraft {
        PackageDraft::from(complete_record())
    }

    #[test]
    fn complete_draft_is_valid() {
        assert_eq!(draft().validate(), Ok(()));
    }

    #[test]
    fn edits_leave_original_untouched() {
        let original = draft();
        let edited = original.apply(FieldEdit::Name("Kerala".into()));
        assert_eq!(original.record().package_name, "Goa Getaway");
        assert_eq!(edited.record().package_name, "Kerala");
    }

    #[test]
    fn empty_field_is_reported_first() {
        let d = draft()
            .apply(FieldEdit::Meals("  ".into()))
            .apply(FieldEdit::Price(0.0));
        assert_eq!(d.validate(), Err(ValidationError::MissingField("Meals")));
    }

    #[test]
    fn zero_and_negative_price() {
        assert_eq!(
            draft().apply(FieldEdit::Price(0.0)).validate(),
            Err(ValidationError::MissingPrice)
        );
        assert_eq!(
            draft().apply(FieldEdit::Price(-5.0)).validate(),
            Err(ValidationError::NegativePrice(-5.0))
        );
    }

    #[test]
    fn non_finite_price_is_rejected() {
        for price in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let d = draft().apply(FieldEdit::Price(price));
            assert_eq!(
                d.prepare_for_submit(),
                Err(ValidationError::InvalidAmount { field: "Price" })
            );
        }
    }

    #[test]
    fn non_finite_discount_on_offer_is_rejected() {
        let d = draft()
            .apply(FieldEdit::Offer(true))
            .apply(FieldEdit::DiscountPrice(f64::NAN));
        assert_eq!(
            d.validate(),
            Err(ValidationError::InvalidAmount {
                field: "Discount Price"
            })
        );

        // Without an offer the discount is zeroed before sending.
        let d = d.apply(FieldEdit::Offer(false));
        assert_eq!(d.prepare_for_submit().unwrap().package_discount_price, 0.0);
    }

    #[test]
    fn discount_equal_to_price_on_offer_is_blocked() {
        let d = draft()
            .apply(FieldEdit::Price(100.0))
            .apply(FieldEdit::DiscountPrice(100.0))
            .apply(FieldEdit::Offer(true));
        assert_eq!(
            d.prepare_for_submit(),
            Err(ValidationError::DiscountNotBelowPrice {
                price: 100.0,
                discount: 100.0
            })
        );
    }

    #[test]
    fn discount_is_cleared_without_offer() {
        let d = draft()
            .apply(FieldEdit::Price(100.0))
            .apply(FieldEdit::DiscountPrice(150.0));
        let record = d.prepare_for_submit().unwrap();
        assert_eq!(record.package_discount_price, 0.0);
        // The draft itself keeps what was typed.
        assert_eq!(d.record().package_discount_price, 150.0);
    }

    #[test]
    fn offer_keeps_valid_discount() {
        let d = draft()
            .apply(FieldEdit::Offer(true))
            .apply(FieldEdit::DiscountPrice(450.0));
        assert_eq!(d.prepare_for_submit().unwrap().package_discount_price, 450.0);
    }

    #[test]
    fn durations_must_be_positive() {
        assert_eq!(
            draft().apply(FieldEdit::Days(0)).validate(),
            Err(ValidationError::InvalidDuration { field: "Days" })
        );
        assert_eq!(
            draft().apply(FieldEdit::Nights(0)).validate(),
            Err(ValidationError::InvalidDuration { field: "Nights" })
        );
    }

    #[test]
    fn image_list_edits() {
        let d = draft().with_images_appended(&["b".into(), "c".into()]);
        assert_eq!(d.images(), ["https://cdn.test/a.jpg", "b", "c"]);

        let d = d.without_image(0);
        assert_eq!(d.images(), ["b", "c"]);
        assert_eq!(d.without_image(9), d);
    }

    #[test]
    fn more_than_five_images_is_invalid() {
        let urls: Vec<String> = (0..5).map(|i| format!("u{i}")).collect();
        let d = draft().with_images_appended(&urls);
        assert_eq!(
            d.validate(),
            Err(ValidationError::TooManyImages { count: 6, max: 5 })
        );
    }
}

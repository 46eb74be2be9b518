//! Shipping address captured by the checkout form.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Required fields of a [`ShippingAddress`], in form order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressField {
    RecipientName,
    Phone,
    Governorate,
    City,
    Street,
}

impl AddressField {
    /// All required fields, in the order they are validated.
    pub const REQUIRED: [Self; 5] = [
        Self::RecipientName,
        Self::Phone,
        Self::Governorate,
        Self::City,
        Self::Street,
    ];

    /// Human-readable field label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::RecipientName => "Recipient name",
            Self::Phone => "Phone number",
            Self::Governorate => "Governorate",
            Self::City => "City",
            Self::Street => "Street address",
        }
    }
}

impl fmt::Display for AddressField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors produced by [`ShippingAddress::validate`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// A required field is empty or whitespace.
    #[error("{0} is required")]
    MissingField(AddressField),
}

/// Delivery address for a cash-on-delivery order.
///
/// Submission is blocked while any required field is blank. Optional fields
/// are omitted from the order payload when empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    #[serde(rename = "name")]
    pub recipient_name: String,
    pub phone: String,
    pub governorate: String,
    pub city: String,
    #[serde(rename = "address")]
    pub street: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apartment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landmark: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

impl ShippingAddress {
    /// Value of a required field.
    #[must_use]
    pub fn field(&self, field: AddressField) -> &str {
        match field {
            AddressField::RecipientName => &self.recipient_name,
            AddressField::Phone => &self.phone,
            AddressField::Governorate => &self.governorate,
            AddressField::City => &self.city,
            AddressField::Street => &self.street,
        }
    }

    /// Required fields that are currently blank.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<AddressField> {
        AddressField::REQUIRED
            .into_iter()
            .filter(|f| self.field(*f).trim().is_empty())
            .collect()
    }

    /// Check that every required field is filled in.
    ///
    /// # Errors
    ///
    /// Returns the first blank required field, in form order.
    pub fn validate(&self) -> Result<(), AddressError> {
        match self.missing_fields().first() {
            Some(field) => Err(AddressError::MissingField(*field)),
            None => Ok(()),
        }
    }

    /// Copy of this address with optional fields trimmed and blanks dropped.
    #[must_use]
    pub fn normalized(&self) -> Self {
        fn clean(value: Option<&String>) -> Option<String> {
            value
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        }

        Self {
            recipient_name: self.recipient_name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            governorate: self.governorate.trim().to_string(),
            city: self.city.trim().to_string(),
            street: self.street.trim().to_string(),
            building: clean(self.building.as_ref()),
            floor: clean(self.floor.as_ref()),
            apartment: clean(self.apartment.as_ref()),
            landmark: clean(self.landmark.as_ref()),
            postal_code: clean(self.postal_code.as_ref()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn complete() -> ShippingAddress {
        ShippingAddress {
            recipient_name: "Mona Adel".to_string(),
            phone: "01000000000".to_string(),
            governorate: "Giza".to_string(),
            city: "Dokki".to_string(),
            street: "12 Tahrir St".to_string(),
            ..ShippingAddress::default()
        }
    }

    #[test]
    fn test_complete_address_validates() {
        assert_eq!(complete().validate(), Ok(()));
    }

    #[test]
    fn test_missing_city_is_reported() {
        let address = ShippingAddress {
            city: "  ".to_string(),
            ..complete()
        };
        assert_eq!(
            address.validate(),
            Err(AddressError::MissingField(AddressField::City))
        );
        assert_eq!(
            address.validate().unwrap_err().to_string(),
            "City is required"
        );
    }

    #[test]
    fn test_first_missing_field_wins() {
        let address = ShippingAddress::default();
        assert_eq!(address.missing_fields().len(), 5);
        assert_eq!(
            address.validate(),
            Err(AddressError::MissingField(AddressField::RecipientName))
        );
    }

    #[test]
    fn test_serialized_shape_omits_empty_optionals() {
        let address = ShippingAddress {
            floor: Some("  ".to_string()),
            landmark: Some("Near the mosque".to_string()),
            ..complete()
        }
        .normalized();

        let value = serde_json::to_value(&address).unwrap();
        assert_eq!(value["name"], "Mona Adel");
        assert_eq!(value["address"], "12 Tahrir St");
        assert_eq!(value["landmark"], "Near the mosque");
        assert!(value.get("floor").is_none());
        assert!(value.get("building").is_none());
    }
}

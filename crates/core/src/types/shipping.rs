//! Shipping details collected at checkout.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length for any single shipping field.
pub const MAX_FIELD_LENGTH: usize = 200;

/// Shipping form fields, used to key validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShippingField {
    Name,
    Phone,
    Address,
    City,
    State,
    Pincode,
}

impl ShippingField {
    /// Form label for the field.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Name => "Full Name",
            Self::Phone => "Phone Number",
            Self::Address => "Address",
            Self::City => "City",
            Self::State => "State",
            Self::Pincode => "Pincode",
        }
    }
}

/// A single validation failure on a shipping field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShippingFieldError {
    #[error("{} is required", .0.label())]
    Required(ShippingField),
    #[error("{} must be at most {MAX_FIELD_LENGTH} characters", .0.label())]
    TooLong(ShippingField),
    #[error("Phone Number must be a 10-digit mobile number")]
    InvalidPhone,
    #[error("Pincode must be 6 digits")]
    InvalidPincode,
}

impl ShippingFieldError {
    /// The field this error belongs to.
    #[must_use]
    pub const fn field(&self) -> ShippingField {
        match self {
            Self::Required(field) | Self::TooLong(field) => *field,
            Self::InvalidPhone => ShippingField::Phone,
            Self::InvalidPincode => ShippingField::Pincode,
        }
    }
}

/// Where to ship an order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

impl ShippingDetails {
    /// Validate and normalize the details.
    ///
    /// Text fields are trimmed, the phone number is reduced to its ten
    /// digits, and the pincode is trimmed. Every problem is reported, not
    /// just the first.
    ///
    /// # Errors
    ///
    /// Returns the list of field errors when any field is invalid.
    pub fn validate(&self) -> Result<Self, Vec<ShippingFieldError>> {
        let mut errors = Vec::new();

        let name = required_text(&self.name, ShippingField::Name, &mut errors);
        let address = required_text(&self.address, ShippingField::Address, &mut errors);
        let city = required_text(&self.city, ShippingField::City, &mut errors);
        let state = required_text(&self.state, ShippingField::State, &mut errors);

        let phone = if self.phone.trim().is_empty() {
            errors.push(ShippingFieldError::Required(ShippingField::Phone));
            String::new()
        } else {
            normalize_phone(&self.phone).unwrap_or_else(|| {
                errors.push(ShippingFieldError::InvalidPhone);
                String::new()
            })
        };

        let pincode = self.pincode.trim().to_string();
        if pincode.is_empty() {
            errors.push(ShippingFieldError::Required(ShippingField::Pincode));
        } else if !is_valid_pincode(&pincode) {
            errors.push(ShippingFieldError::InvalidPincode);
        }

        if errors.is_empty() {
            Ok(Self {
                name,
                phone,
                address,
                city,
                state,
                pincode,
            })
        } else {
            Err(errors)
        }
    }
}

fn required_text(value: &str, field: ShippingField, errors: &mut Vec<ShippingFieldError>) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.push(ShippingFieldError::Required(field));
    } else if trimmed.chars().count() > MAX_FIELD_LENGTH {
        errors.push(ShippingFieldError::TooLong(field));
    }
    trimmed.to_string()
}

/// Reduce an Indian mobile number to its ten digits.
///
/// Accepts spaces, dashes, and an optional `+91`/`91`/`0` prefix.
fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let digits = digits.strip_prefix('+').unwrap_or(&digits);

    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let national = match digits.len() {
        10 => digits,
        11 => digits.strip_prefix('0')?,
        12 => digits.strip_prefix("91")?,
        _ => return None,
    };

    Some(national.to_string())
}

fn is_valid_pincode(pincode: &str) -> bool {
    pincode.len() == 6
        && pincode.chars().all(|c| c.is_ascii_digit())
        && !pincode.starts_with('0')
}

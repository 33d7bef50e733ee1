//! Field rules applied by handlers and repositories before anything is
//! written. Stock and cart-shape rules live in [`crate::checkout`]; SQLite
//! still enforces `CHECK (quantity >= 0)` and `UNIQUE (users.email)`.
//!
//! ```rust
//! use tally_core::validation::{normalize_email, validate_quantity};
//!
//! assert_eq!(normalize_email("  Ann@Shop.IO ").unwrap(), "ann@shop.io");
//! assert!(validate_quantity(5).is_ok());
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MAX_PASSWORD_LEN, MAX_STOCK_QUANTITY, MIN_PASSWORD_LEN};

pub type ValidationResult<T> = Result<T, ValidationError>;

const PRODUCT_NAME_MAX: usize = 200;
const PERSON_NAME_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 2000;
const CATEGORY_MAX: usize = 100;
const SEARCH_MAX: usize = 100;
const EMAIL_MAX: usize = 254;

/// Text limit for one named field. Length counts chars, not bytes.
struct Text {
    field: &'static str,
    max: usize,
}

impl Text {
    const fn new(field: &'static str, max: usize) -> Self {
        Text { field, max }
    }

    fn required(&self, value: &str) -> ValidationResult<()> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ValidationError::required(self.field));
        }
        self.within_max(value)
    }

    fn optional(&self, value: Option<&str>) -> ValidationResult<()> {
        value.map_or(Ok(()), |v| self.within_max(v))
    }

    fn within_max(&self, value: &str) -> ValidationResult<()> {
        if value.chars().count() > self.max {
            return Err(ValidationError::too_long(self.field, self.max));
        }
        Ok(())
    }
}

/// ```rust
/// use tally_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Widget").is_ok());
/// assert!(validate_product_name("  ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    Text::new("name", PRODUCT_NAME_MAX).required(name)
}

pub fn validate_description(description: Option<&str>) -> ValidationResult<()> {
    Text::new("description", DESCRIPTION_MAX).optional(description)
}

pub fn validate_category(category: Option<&str>) -> ValidationResult<()> {
    Text::new("category", CATEGORY_MAX).optional(category)
}

/// A user's display name.
pub fn validate_person_name(name: &str) -> ValidationResult<()> {
    Text::new("name", PERSON_NAME_MAX).required(name)
}

pub fn validate_customer_name(name: Option<&str>) -> ValidationResult<()> {
    Text::new("customer_name", PERSON_NAME_MAX).optional(name)
}

/// Trims the query; an empty result means "no filter".
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();
    Text::new("search", SEARCH_MAX).within_max(query)?;
    Ok(query.to_string())
}

/// Lowercases and trims, then checks the shape `local@domain.tld`.
///
/// Accounts are looked up by the normalized form, so `Ann@Shop.io` and
/// `ann@shop.io` are the same user.
pub fn normalize_email(email: &str) -> ValidationResult<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ValidationError::required("email"));
    }
    if email.len() > EMAIL_MAX {
        return Err(ValidationError::too_long("email", EMAIL_MAX));
    }

    let well_formed = !email.chars().any(char::is_whitespace)
        && match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            }
            None => false,
        };

    if !well_formed {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must be a valid email address".to_string(),
        });
    }
    Ok(email)
}

/// Length only; what goes into a password is up to the user.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    match password.chars().count() {
        n if n < MIN_PASSWORD_LEN => Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LEN,
        }),
        n if n > MAX_PASSWORD_LEN => Err(ValidationError::too_long("password", MAX_PASSWORD_LEN)),
        _ => Ok(()),
    }
}

fn in_range(field: &str, value: i64, min: i64, max: i64) -> ValidationResult<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max,
        })
    }
}

fn positive(field: &str, value: i64) -> ValidationResult<()> {
    if value > 0 {
        Ok(())
    } else {
        Err(ValidationError::MustBePositive {
            field: field.to_string(),
        })
    }
}

/// Quantity on one cart line: 1 through [`MAX_ITEM_QUANTITY`].
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    positive("quantity", qty)?;
    in_range("quantity", qty, 1, MAX_ITEM_QUANTITY)
}

/// Quantity-on-hand as entered on a product.
pub fn validate_stock_quantity(qty: i64) -> ValidationResult<()> {
    in_range("quantity", qty, 0, MAX_STOCK_QUANTITY)
}

/// Zero is a valid price.
///
/// ```rust
/// use tally_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(0).is_ok());
/// assert!(validate_price_cents(-1).is_err());
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    in_range("price", cents, 0, i64::MAX)
}

pub fn validate_payment_amount(cents: i64) -> ValidationResult<()> {
    positive("amount_paid", cents)
}

/// Ids that end up in file paths (receipts) must be real UUIDs.
///
/// ```rust
/// use tally_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("../etc/passwd").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required("id"));
    }
    uuid::Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|_| ValidationError::InvalidFormat {
            field: "id".to_string(),
            reason: "must be a valid UUID".to_string(),
        })
}

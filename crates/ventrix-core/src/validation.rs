//! # Validation Module
//!
//! Input validation for VenTrix request records.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Deserialization (serde)                                      │
//! │  ├── Closed enums reject unknown values                                │
//! │  └── Patch<T> separates "absent" from "null"                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Lengths, formats, ranges                                          │
//! │  └── Image upload extension and size                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  ├── UNIQUE constraints                                                │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use ventrix_core::validation::{validate_cantidad, validate_text};
//!
//! validate_text("nombre", "Bandeja paisa", 100).unwrap();
//! validate_cantidad(2).unwrap();
//! ```

use crate::error::ValidationError;
use crate::{MAX_IMAGE_BYTES, MAX_LINE_QUANTITY, SUPPORTED_IMAGE_FORMATS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required free-text field.
///
/// ## Rules
/// - Must not be empty after trimming
/// - At most `max` characters
///
/// ## Example
/// ```rust
/// use ventrix_core::validation::validate_text;
///
/// assert!(validate_text("nombre", "Mesa 1", 100).is_ok());
/// assert!(validate_text("nombre", "   ", 100).is_err());
/// ```
pub fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates an optional free-text field (only the length is checked).
pub fn validate_optional_text(field: &str, value: Option<&str>, max: usize) -> ValidationResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        _ => Ok(()),
    }
}

/// Validates an identity document number.
///
/// ## Rules
/// - 1 to 10 characters
/// - Letters and digits only
pub fn validate_documento(documento: &str) -> ValidationResult<()> {
    validate_text("documento", documento, 10)?;

    if !documento.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "documento".to_string(),
            reason: "must contain only letters and digits".to_string(),
        });
    }

    Ok(())
}

/// Validates an email address.
///
/// Only the shape is checked: one `@`, non-empty local part, a dot in the
/// domain, no whitespace, at most 100 characters.
///
/// ```rust
/// use ventrix_core::validation::validate_correo;
///
/// assert!(validate_correo("ana@restaurante.co").is_ok());
/// assert!(validate_correo("ana.restaurante.co").is_err());
/// ```
pub fn validate_correo(correo: &str) -> ValidationResult<()> {
    validate_text("correo", correo, 100)?;

    let invalid = || ValidationError::InvalidFormat {
        field: "correo".to_string(),
        reason: "must be a valid email address".to_string(),
    };

    if correo.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = correo.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && !tld.is_empty() => Ok(()),
        _ => Err(invalid()),
    }
}

/// Validates a phone number: 7 to 10 digits.
pub fn validate_telefono(telefono: &str) -> ValidationResult<()> {
    let len = telefono.chars().count();
    if len == 0 {
        return Err(ValidationError::Required {
            field: "telefono".to_string(),
        });
    }

    if !telefono.chars().all(|c| c.is_ascii_digit()) || !(7..=10).contains(&len) {
        return Err(ValidationError::InvalidFormat {
            field: "telefono".to_string(),
            reason: "must be 7 to 10 digits".to_string(),
        });
    }

    Ok(())
}

/// Validates a plaintext password before it is hashed.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::Required {
            field: "password".to_string(),
        });
    }

    if password.chars().count() > 128 {
        return Err(ValidationError::TooLong {
            field: "password".to_string(),
            max: 128,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates the quantity of an order line.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_LINE_QUANTITY (999)
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Waiter: add "Limonada" x 3                                             │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_cantidad(3) ← THIS FUNCTION                                  │
/// │       │                                                                 │
/// │       ├── qty <= 0?  → Error: "cantidad must be positive"              │
/// │       ├── qty > 999? → Error: "cantidad must be between 1 and 999"     │
/// │       └── OK → add_line                                                 │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_cantidad(cantidad: i64) -> ValidationResult<()> {
    if cantidad <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "cantidad".to_string(),
        });
    }

    if cantidad > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "cantidad".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in cents.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (courtesy items)
///
/// ```rust
/// use ventrix_core::validation::validate_precio_cents;
///
/// assert!(validate_precio_cents(1250).is_ok());
/// assert!(validate_precio_cents(0).is_ok());
/// assert!(validate_precio_cents(-100).is_err());
/// ```
pub fn validate_precio_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "precio_cents".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a caller-supplied text id (restaurants, branches).
///
/// Ids end up in image keys, so only ASCII letters, digits, `-` and `_`
/// are accepted.
pub fn validate_text_id(field: &str, id: &str, max_len: usize) -> ValidationResult<()> {
    validate_text(field, id, max_len)?;

    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must contain only letters, digits, '-' and '_'".to_string(),
        });
    }

    Ok(())
}

/// Validates a caller-supplied numeric id.
pub fn validate_id(field: &str, id: i64) -> ValidationResult<()> {
    if id <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Image Validators
// =============================================================================

/// Validates an uploaded image and returns its lower-cased extension.
///
/// ## Rules
/// - Extension is one of png, jpg, jpeg, webp
/// - Not empty, at most 5 MiB
pub fn validate_image(filename: &str, size: usize) -> ValidationResult<String> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if !SUPPORTED_IMAGE_FORMATS.contains(&extension.as_str()) {
        return Err(ValidationError::NotAllowed {
            field: "imagen".to_string(),
            allowed: SUPPORTED_IMAGE_FORMATS.iter().map(|s| s.to_string()).collect(),
        });
    }

    if size == 0 {
        return Err(ValidationError::Required {
            field: "imagen".to_string(),
        });
    }

    if size > MAX_IMAGE_BYTES {
        return Err(ValidationError::OutOfRange {
            field: "imagen".to_string(),
            min: 1,
            max: MAX_IMAGE_BYTES as i64,
        });
    }

    Ok(extension)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_text() {
        assert!(validate_text("nombre", "Ajiaco", 100).is_ok());
        assert!(validate_text("nombre", "", 100).is_err());
        assert!(validate_text("nombre", &"a".repeat(101), 100).is_err());
        // length counts characters, not bytes
        assert!(validate_text("nombre", &"ñ".repeat(100), 100).is_ok());
    }

    #[test]
    fn test_validate_documento() {
        assert!(validate_documento("1020304050").is_ok());
        assert!(validate_documento("10203040501").is_err());
        assert!(validate_documento("10.203").is_err());
    }

    #[test]
    fn test_validate_text_id() {
        assert!(validate_text_id("id", "centro", 100).is_ok());
        assert!(validate_text_id("id", "6f1c2a9e-1b2c-4d5e-8f90-0a1b2c3d4e5f", 100).is_ok());
        assert!(validate_text_id("id", "sede_norte-2", 100).is_ok());
        assert!(validate_text_id("id", "../x", 100).is_err());
        assert!(validate_text_id("id", "a/b", 100).is_err());
        assert!(validate_text_id("id", "sede norte", 100).is_err());
        assert!(validate_text_id("id", "", 100).is_err());
    }

    #[test]
    fn test_validate_correo() {
        assert!(validate_correo("caja@sucursal.com.co").is_ok());
        assert!(validate_correo("@sucursal.com").is_err());
        assert!(validate_correo("caja@sucursal").is_err());
        assert!(validate_correo("caja @sucursal.com").is_err());
        assert!(validate_correo("a@b@c.com").is_err());
    }

    #[test]
    fn test_validate_telefono() {
        assert!(validate_telefono("3001234567").is_ok());
        assert!(validate_telefono("6041234").is_ok());
        assert!(validate_telefono("300-123").is_err());
        assert!(validate_telefono("30012345678").is_err());
    }

    #[test]
    fn test_validate_cantidad() {
        assert!(validate_cantidad(1).is_ok());
        assert!(validate_cantidad(999).is_ok());
        assert!(validate_cantidad(0).is_err());
        assert!(validate_cantidad(-2).is_err());
        assert!(validate_cantidad(1000).is_err());
    }

    #[test]
    fn test_validate_image() {
        assert_eq!(validate_image("logo.PNG", 10).unwrap(), "png");
        assert_eq!(validate_image("plato.jpeg", 2048).unwrap(), "jpeg");
        assert!(validate_image("menu.pdf", 10).is_err());
        assert!(validate_image("sin_extension", 10).is_err());
        assert!(validate_image("vacio.webp", 0).is_err());
        assert!(validate_image("grande.jpg", MAX_IMAGE_BYTES + 1).is_err());
    }
}

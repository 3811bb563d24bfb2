//! # Partial Updates
//!
//! `Patch<T>` distinguishes the three states a field of an update request
//! can be in.
//!
//! ```text
//! JSON body                 Patch<String>         Effect on the row
//! ─────────────────────     ──────────────────    ──────────────────────
//! { }                       Unset                 column untouched
//! { "descripcion": null }   Null                  column set to NULL
//! { "descripcion": "x" }    Value("x")            column set to 'x'
//! ```
//!
//! A `Null` on a column that cannot be NULL is a validation error, see
//! [`Patch::require`].
//!
//! ## Serde
//! Fields must carry `#[serde(default)]` so that an absent key becomes
//! `Unset`; a present `null` deserializes to `Null`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// One field of a partial update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
    /// Field omitted: leave the stored value alone.
    Unset,
    /// Field explicitly null: clear the stored value.
    Null,
    /// Field present: overwrite the stored value.
    Value(T),
}

impl<T> Default for Patch<T> {
    fn default() -> Self {
        Patch::Unset
    }
}

impl<T> Patch<T> {
    #[inline]
    pub const fn is_unset(&self) -> bool {
        matches!(self, Patch::Unset)
    }

    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Patch::Null)
    }

    pub const fn as_ref(&self) -> Patch<&T> {
        match self {
            Patch::Unset => Patch::Unset,
            Patch::Null => Patch::Null,
            Patch::Value(v) => Patch::Value(v),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Patch<U> {
        match self {
            Patch::Unset => Patch::Unset,
            Patch::Null => Patch::Null,
            Patch::Value(v) => Patch::Value(f(v)),
        }
    }

    /// `None` when unset, `Some(None)` when null, `Some(Some(v))` otherwise.
    pub fn into_option(self) -> Option<Option<T>> {
        match self {
            Patch::Unset => None,
            Patch::Null => Some(None),
            Patch::Value(v) => Some(Some(v)),
        }
    }

    /// Treats the field as non-nullable.
    ///
    /// Returns `Ok(None)` for `Unset`, `Ok(Some(v))` for a value and
    /// `NotNullable` for `Null`.
    pub fn require(self, field: &str) -> Result<Option<T>, ValidationError> {
        match self {
            Patch::Unset => Ok(None),
            Patch::Null => Err(ValidationError::NotNullable {
                field: field.to_string(),
            }),
            Patch::Value(v) => Ok(Some(v)),
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Patch::Value(v),
            None => Patch::Null,
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Patch::from)
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Patch::Value(v) => serializer.serialize_some(v),
            Patch::Unset | Patch::Null => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, Serialize)]
    struct Body {
        #[serde(default, skip_serializing_if = "Patch::is_unset")]
        descripcion: Patch<String>,
        #[serde(default, skip_serializing_if = "Patch::is_unset")]
        precio_cents: Patch<i64>,
    }

    #[test]
    fn test_absent_null_and_value_are_distinct() {
        let body: Body = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(body.descripcion, Patch::Unset);

        let body: Body = serde_json::from_str(r#"{"descripcion": null}"#).unwrap();
        assert_eq!(body.descripcion, Patch::Null);
        assert_eq!(body.precio_cents, Patch::Unset);

        let body: Body = serde_json::from_str(r#"{"descripcion": "picante"}"#).unwrap();
        assert_eq!(body.descripcion, Patch::Value("picante".to_string()));
    }

    #[test]
    fn test_require_rejects_null() {
        let err = Patch::<i64>::Null.require("precio_cents").unwrap_err();
        assert_eq!(
            err,
            ValidationError::NotNullable {
                field: "precio_cents".to_string()
            }
        );
        assert_eq!(Patch::<i64>::Unset.require("precio_cents").unwrap(), None);
        assert_eq!(Patch::Value(5).require("precio_cents").unwrap(), Some(5));
    }

    #[test]
    fn test_serialize_skips_unset() {
        let body = Body {
            descripcion: Patch::Null,
            precio_cents: Patch::Unset,
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"descripcion":null}"#
        );
    }
}

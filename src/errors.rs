//! Error types shared by the element, reduction and catalog code.
//!
//! Validation happens at the boundary (setters, catalog ingestion). Anything that
//! slips through and would turn into NaN/Inf in the resistance calculation is
//! reported as [`ElementError::InvalidThermalConfiguration`] instead.

use thiserror::Error;

use crate::element::ElementKind;

pub type ElementResult<T> = Result<T, ElementError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ElementError {
    /// The value could not be coerced to the type the field expects.
    #[error("Can't convert {field} from {value:?}")]
    Conversion { field: &'static str, value: String },

    /// The value has the right type but violates a precondition of the field.
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidInput {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Specify year of construction before year of retrofit")]
    RetrofitBeforeConstruction,

    /// Density or thermal conductivity is still zero after resolving the material.
    #[error("Material {name:?} is not sufficiently specified (density and thermal conductivity must be non-zero)")]
    InsufficientMaterial { name: String },

    #[error("Invalid thermal configuration: {reason}")]
    InvalidThermalConfiguration { reason: String },

    #[error("No catalog entry for {kind} (year {year:?}, construction {construction:?}, key {key:?})")]
    NoMatchingCatalogEntry {
        kind: ElementKind,
        year: Option<i32>,
        construction: Option<String>,
        key: Option<String>,
    },

    #[error("Retrofit is not defined for {kind}")]
    RetrofitUnsupported { kind: ElementKind },

    #[error("Could not find {label} {index}")]
    UnknownHandle { label: &'static str, index: usize },
}

impl ElementError {
    pub fn invalid_input(
        field: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        ElementError::InvalidInput {
            field,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        ElementError::InvalidThermalConfiguration {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_field() {
        let message = format!(
            "{}",
            ElementError::Conversion {
                field: "inner_convection",
                value: "abc".into()
            }
        );
        message
            .find("inner_convection")
            .expect("Error message should contain the name of the field");
        message
            .find("abc")
            .expect("Error message should contain the offending value");
    }

    #[test]
    fn catalog_miss_mentions_kind() {
        let message = format!(
            "{}",
            ElementError::NoMatchingCatalogEntry {
                kind: ElementKind::Rooftop,
                year: Some(1950),
                construction: Some("heavy".into()),
                key: None,
            }
        );
        message
            .find("Rooftop")
            .expect("Error message should contain the element kind");
        message
            .find("1950")
            .expect("Error message should contain the requested year");
    }
}

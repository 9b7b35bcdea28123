//! Typed property filters for venue selection.
//!
//! A filter names a venue property, an operator and an expected value.
//! The combination is validated against the property schema when the
//! filter is built, so a typo'd property or a shape mismatch surfaces
//! as a configuration error before any network call is made.

use crate::error::{Error, Result};
use crate::exchange::{property_kind, ExchangeClient, PropertyKind, PropertyValue};

/// How a filter compares the property against its expected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Scalar property equals a scalar value.
    Eq,
    /// List property contains a scalar value.
    MemberOf,
    /// List property contains every element of a list value.
    SubsetOf,
    /// Map property carries every key/value pair of a map value.
    MapMatches,
}

/// One validated predicate over venue properties.
///
/// `negate` flips each elementary comparison (blacklist semantics): a
/// negated [`FilterOp::SubsetOf`] requires every element to be absent,
/// not merely some.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyFilter {
    property: String,
    op: FilterOp,
    value: PropertyValue,
    negate: bool,
}

impl PropertyFilter {
    /// Build a filter, rejecting unknown properties and shape
    /// mismatches.
    pub fn new(
        property: impl Into<String>,
        op: FilterOp,
        value: PropertyValue,
        negate: bool,
    ) -> Result<Self> {
        let property = property.into();
        let Some(kind) = property_kind(&property) else {
            return Err(Error::Config(format!(
                "{property} is not a valid venue property"
            )));
        };

        let compatible = matches!(
            (kind, op, &value),
            (PropertyKind::Scalar, FilterOp::Eq, PropertyValue::Scalar(_))
                | (PropertyKind::List, FilterOp::MemberOf, PropertyValue::Scalar(_))
                | (PropertyKind::List, FilterOp::SubsetOf, PropertyValue::List(_))
                | (PropertyKind::Map, FilterOp::MapMatches, PropertyValue::Map(_))
        );
        if !compatible {
            return Err(Error::Config(format!(
                "venue property {property} ({kind:?}) cannot be matched with {op:?} against {value:?}"
            )));
        }

        Ok(Self {
            property,
            op,
            value,
            negate,
        })
    }

    /// Shorthand for the common country whitelist/blacklist.
    pub fn countries(country: &str, negate: bool) -> Result<Self> {
        Self::new(
            "countries",
            FilterOp::MemberOf,
            PropertyValue::Scalar(country.to_string()),
            negate,
        )
    }

    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Evaluate the filter against a loaded venue client.
    #[must_use]
    pub fn matches(&self, client: &dyn ExchangeClient) -> bool {
        let Some(actual) = resolve_property(client, &self.property) else {
            return false;
        };
        match (&actual, self.op, &self.value) {
            (PropertyValue::Scalar(actual), FilterOp::Eq, PropertyValue::Scalar(expected)) => {
                (actual == expected) != self.negate
            }
            (PropertyValue::List(actual), FilterOp::MemberOf, PropertyValue::Scalar(expected)) => {
                actual.contains(expected) != self.negate
            }
            (PropertyValue::List(actual), FilterOp::SubsetOf, PropertyValue::List(expected)) => {
                expected
                    .iter()
                    .all(|element| actual.contains(element) != self.negate)
            }
            (PropertyValue::Map(actual), FilterOp::MapMatches, PropertyValue::Map(expected)) => {
                expected
                    .iter()
                    .all(|(key, value)| (actual.get(key) == Some(value)) != self.negate)
            }
            // Shape mismatches were rejected at construction time; a
            // client producing a different shape fails the filter.
            _ => false,
        }
    }
}

/// Resolve a schema property name to its value for one venue.
fn resolve_property(client: &dyn ExchangeClient, name: &str) -> Option<PropertyValue> {
    let properties = client.properties();
    match name {
        "id" => Some(PropertyValue::Scalar(client.id().as_str().to_string())),
        "name" => Some(PropertyValue::Scalar(properties.name)),
        "countries" => Some(PropertyValue::List(properties.countries)),
        "currencies" => Some(PropertyValue::List(client.currencies())),
        "symbols" => Some(PropertyValue::List(client.symbols())),
        "has" => Some(PropertyValue::Map(properties.has)),
        _ => None,
    }
}

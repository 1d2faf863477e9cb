//! Wire types for the two external order systems
//!
//! The bridge moves orders from a storefront (the *source* system) into a
//! fulfillment backend (the *destination* system). Both talk JSON over
//! HTTP; these are the envelopes the bridge actually inspects. Order
//! payloads themselves stay opaque (`serde_json::Value`): the bridge
//! forwards them, it does not interpret them.

use serde::{Deserialize, Serialize};

/// Metadata key on a source order holding the destination order UUID.
pub const DESTINATION_ID_KEY: &str = "_destination_order_id";

/// Metadata key on a source order holding the human-readable destination
/// order number.
pub const DESTINATION_NUMBER_KEY: &str = "_destination_order_number";

/// Identifiers assigned by the destination system when an order is created.
///
/// Written back onto the source order as metadata (the "link-back") so
/// later reconciliation sweeps and humans can find the linkage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationRef {
    /// Unique identifier in the destination system
    pub id: String,
    /// Human-readable order number in the destination system
    pub number: String,
}

/// `meta` envelope carried by destination API entities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Meta {
    pub href: Option<String>,
}

/// Response body of a destination order creation.
///
/// All fields are optional on the wire: a structurally incomplete success
/// response is a real failure mode and must be detected, not panicked on.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DestinationOrderCreated {
    pub id: Option<String>,
    pub name: Option<String>,
    pub meta: Option<Meta>,
}

impl DestinationOrderCreated {
    /// Validate the envelope and extract the destination identifiers.
    ///
    /// A valid creation response carries `id`, `name` and `meta.href`.
    /// Returns a description of the first missing field otherwise.
    pub fn into_ref(self) -> Result<DestinationRef, String> {
        let id = self.id.ok_or("response missing 'id'")?;
        let number = self.name.ok_or("response missing 'name'")?;
        if self.meta.and_then(|m| m.href).is_none() {
            return Err("response missing 'meta.href'".into());
        }
        Ok(DestinationRef { id, number })
    }
}

/// Reference to a destination order state (status) on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateRef {
    pub name: Option<String>,
}

/// A destination order as returned by the recently-changed listing
/// (`expand=state`).
#[derive(Debug, Clone, Deserialize)]
pub struct DestinationOrder {
    pub id: String,
    pub name: Option<String>,
    /// Source order id carried as the external reference
    pub external_code: Option<String>,
    pub state: Option<StateRef>,
}

impl DestinationOrder {
    /// Linked source order id, if the external reference is present and
    /// numeric.
    pub fn source_order_id(&self) -> Option<i64> {
        self.external_code.as_deref()?.parse().ok()
    }

    /// Current status name, if the state was expanded.
    pub fn status_name(&self) -> Option<&str> {
        self.state.as_ref()?.name.as_deref()
    }
}

/// Entry of the destination status catalog (`states` in the entity
/// metadata).
#[derive(Debug, Clone, Deserialize)]
pub struct StatusCatalogEntry {
    pub name: String,
    #[serde(default)]
    pub meta: Meta,
}

/// One key/value metadata entry on a source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaDataEntry {
    pub key: String,
    pub value: String,
}

/// A source (storefront) order, as returned by its REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceOrder {
    pub id: i64,
    pub status: Option<String>,
    #[serde(default)]
    pub meta_data: Vec<MetaDataEntry>,
}

impl SourceOrder {
    /// Look up a metadata value by key.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.meta_data
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    /// Destination order id this source order is linked to, if any.
    pub fn destination_id(&self) -> Option<&str> {
        self.metadata_value(DESTINATION_ID_KEY)
    }
}

/// Partial update applied to a source order.
///
/// Metadata writes are idempotent on the source side: re-applying the
/// same patch is safe.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceOrderPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub meta_data: Vec<MetaDataEntry>,
}

impl SourceOrderPatch {
    /// Build the link-back patch: tag the source order with the
    /// destination identifiers and adopt the destination order number.
    pub fn link(destination: &DestinationRef) -> Self {
        Self {
            number: Some(destination.number.clone()),
            meta_data: vec![
                MetaDataEntry {
                    key: DESTINATION_ID_KEY.into(),
                    value: destination.id.clone(),
                },
                MetaDataEntry {
                    key: DESTINATION_NUMBER_KEY.into(),
                    value: destination.number.clone(),
                },
            ],
        }
    }
}

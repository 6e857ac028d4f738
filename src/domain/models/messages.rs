//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// Wire format of the event published to the orders queue and its JSON codec.
//
// | Name                 | Description                                        | Key Methods      |
// |----------------------|----------------------------------------------------|------------------|
// | OrderCreatedMessage  | Event emitted once an order request is accepted    | encode, decode   |
// | OrderItemMessage     | One line of the event                              | line_total       |
// | CodecError           | Malformed payloads                                 |                  |
//--------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::order::{AmountOverflow, line_total};

/// Event published when an order request has been accepted.
///
/// Decimals travel as JSON strings (`"46.00"`) so no precision is lost; numbers are
/// accepted on input too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedMessage {
    pub order_id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemMessage {
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl OrderItemMessage {
    pub fn line_total(&self) -> Result<Decimal, AmountOverflow> {
        line_total(self.quantity, self.unit_price)
    }
}

impl OrderCreatedMessage {
    /// Serializes the message to its JSON wire form.
    ///
    /// # Errors
    /// Returns `CodecError::Encode` if serialization fails
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Parses a message from its JSON wire form.
    ///
    /// # Errors
    /// Returns `CodecError::Decode` for anything that is not a well-formed message
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(payload).map_err(|e| CodecError::Decode(e.to_string()))
    }

    /// Sum of the lines' totals.
    pub fn items_total(&self) -> Result<Decimal, AmountOverflow> {
        compute_total(self.items.iter().map(|item| (item.quantity, item.unit_price)))
    }
}

/// Sums `quantity * unit_price` over all lines.
///
/// # Errors
/// Returns `AmountOverflow` if a line or the sum does not fit in a `Decimal`
pub fn compute_total<I>(lines: I) -> Result<Decimal, AmountOverflow>
where
    I: IntoIterator<Item = (u32, Decimal)>,
{
    lines
        .into_iter()
        .try_fold(Decimal::ZERO, |total, (quantity, unit_price)| {
            total
                .checked_add(line_total(quantity, unit_price)?)
                .ok_or(AmountOverflow)
        })
}

/// Errors raised by the message codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Failed to encode message: {0}")]
    Encode(String),

    #[error("Failed to decode message: {0}")]
    Decode(String),
}

//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This module defines the persisted order entity, its line items and the order status
// state machine.
//
// | Section            | Description                                                      |
// |--------------------|------------------------------------------------------------------|
// | ENUMS              | OrderStatus and its transition table.                            |
// | STRUCTS            | Order and OrderItem as stored by the repository.                 |
// | ERRORS             | Errors raised while parsing a status or pricing a line.          |
// | TESTS              | Unit tests for the status rules and item totals.                 |
//--------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use uuid::Uuid;

//--------------------------------------------------------------------------------------------------
//  ENUMS
//--------------------------------------------------------------------------------------------------
// | Name          | Description                                           |
// |---------------|-------------------------------------------------------|
// | OrderStatus   | Lifecycle status of an order (Pending/Completed/...). |
//--------------------------------------------------------------------------------------------------

/// Lifecycle status of an order.
///
/// Intake answers with `Pending`; the worker persists orders as `Completed`. Only a
/// pending order may move to another status. Setting the current status again is
/// accepted as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Name used on the wire and in the `orders.status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Whether an order in this status may be moved to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        match (self, next) {
            (current, next) if *current == next => true,
            (Self::Pending, _) => true,
            _ => false,
        }
    }

    /// Whether no other status can follow this one.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderStatusError;

    /// Parses a status name, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        [Self::Pending, Self::Completed, Self::Cancelled]
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| OrderStatusError::Unknown(trimmed.to_string()))
    }
}

/// Errors that can occur when handling order statuses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrderStatusError {
    /// The given text does not name a known status.
    #[error("Unknown order status: {0}")]
    Unknown(String),
}

//--------------------------------------------------------------------------------------------------
//  STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name          | Description                                           |
// |---------------|-------------------------------------------------------|
// | Order         | A persisted order with its items.                     |
// | OrderItem     | A single order line with its computed total.          |
//--------------------------------------------------------------------------------------------------

/// An order as persisted by the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    /// Producer-assigned identifier, shared with the published message.
    pub id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub status: OrderStatus,
    /// Sum of the items' total prices at creation time.
    pub total_amount: Decimal,
    /// Producer-assigned creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Set on every update, `None` until the first one.
    pub updated_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItem>,
}

/// A single order line.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    /// `quantity * unit_price`, computed once when the item is created.
    pub total_price: Decimal,
}

impl OrderItem {
    /// Creates an item for `order_id`, computing its total price.
    ///
    /// # Errors
    /// Returns `AmountOverflow` if the total price does not fit in a `Decimal`
    pub fn new(
        order_id: Uuid,
        product_name: String,
        quantity: u32,
        unit_price: Decimal,
    ) -> Result<Self, AmountOverflow> {
        Ok(Self {
            id: Uuid::new_v4(),
            order_id,
            product_name,
            quantity,
            unit_price,
            total_price: line_total(quantity, unit_price)?,
        })
    }
}

/// Decimal places of currency amounts.
pub const MONEY_SCALE: u32 = 2;

/// Total price of `quantity` units at `unit_price`, as a currency amount.
///
/// # Errors
/// Returns `AmountOverflow` if the product does not fit in a `Decimal`
pub fn line_total(quantity: u32, unit_price: Decimal) -> Result<Decimal, AmountOverflow> {
    let mut total = Decimal::from(quantity)
        .checked_mul(unit_price)
        .ok_or(AmountOverflow)?;
    total.rescale(MONEY_SCALE);
    Ok(total)
}

/// A line or order total exceeds the range of `Decimal`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Amount exceeds the supported range")]
pub struct AmountOverflow;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_pending_can_move_anywhere() {
        let pending = OrderStatus::Pending;
        assert!(pending.can_transition_to(OrderStatus::Pending));
        assert!(pending.can_transition_to(OrderStatus::Completed));
        assert!(pending.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_terminal_statuses_only_accept_themselves() {
        for status in [OrderStatus::Completed, OrderStatus::Cancelled] {
            assert!(status.is_terminal());
            assert!(status.can_transition_to(status));
            assert!(!status.can_transition_to(OrderStatus::Pending));
        }
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Completed));
    }

    #[test]
    fn test_status_parsing_ignores_case() {
        assert_eq!("completed".parse::<OrderStatus>(), Ok(OrderStatus::Completed));
        assert_eq!(" CANCELLED ".parse::<OrderStatus>(), Ok(OrderStatus::Cancelled));
        assert_eq!(
            "Shipped".parse::<OrderStatus>(),
            Err(OrderStatusError::Unknown("Shipped".to_string()))
        );
        assert_eq!(OrderStatus::Pending.to_string(), "Pending");
    }

    #[test]
    fn test_item_total_is_quantity_times_price() {
        let item = OrderItem::new(Uuid::new_v4(), "Product A".into(), 2, dec!(10.5)).unwrap();
        assert_eq!(item.total_price.to_string(), "21.00");
    }

    #[test]
    fn test_line_total_overflow_is_an_error() {
        let huge: Decimal = "79228162514264337593543950".parse().unwrap();
        assert_eq!(line_total(4_000_000_000, huge), Err(AmountOverflow));
        assert!(OrderItem::new(Uuid::new_v4(), "Product A".into(), u32::MAX, Decimal::MAX).is_err());
    }
}

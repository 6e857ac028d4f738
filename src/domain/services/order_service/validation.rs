use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;
use validator::ValidateEmail;

use crate::{
    config::OrderLimits,
    domain::models::{CreateOrderRequest, compute_total},
};

/// A single broken rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Path of the offending field, e.g. `items[1].quantity`
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every rule a create request broke.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Validation failed: {}", join_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Default)]
struct Violations(Vec<FieldViolation>);

impl Violations {
    fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldViolation {
            field: field.into(),
            message: message.into(),
        });
    }

    fn check_len(&mut self, field: impl Into<String>, value: &str, min: usize, max: usize) {
        let len = value.trim().chars().count();
        if len < min || len > max {
            self.push(
                field,
                format!("must be between {} and {} characters, got {}", min, max, len),
            );
        }
    }

    fn into_result(self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations: self.0 })
        }
    }
}

/// Checks a create request against `limits`, collecting every violation.
///
/// # Errors
/// Returns a `ValidationError` listing all broken rules
pub fn validate_create_request(
    request: &CreateOrderRequest,
    limits: &OrderLimits,
) -> Result<(), ValidationError> {
    let mut violations = Violations::default();

    violations.check_len(
        "customerName",
        &request.customer_name,
        limits.min_customer_name_len,
        limits.max_customer_name_len,
    );

    let email = request.customer_email.trim();
    let email_len = email.chars().count();
    if email_len > limits.max_customer_email_len {
        violations.push(
            "customerEmail",
            format!(
                "must be at most {} characters, got {}",
                limits.max_customer_email_len, email_len
            ),
        );
    } else if !email.validate_email() {
        violations.push("customerEmail", "must be a valid email address");
    }

    if request.items.is_empty() {
        violations.push("items", "at least one item is required");
    } else if request.items.len() > limits.max_items {
        violations.push(
            "items",
            format!("at most {} items are allowed, got {}", limits.max_items, request.items.len()),
        );
    }

    for (index, item) in request.items.iter().enumerate() {
        violations.check_len(
            format!("items[{}].productName", index),
            &item.product_name,
            1,
            limits.max_product_name_len,
        );

        let (min_quantity, max_quantity) = (i64::from(limits.min_quantity), i64::from(limits.max_quantity));
        if item.quantity < min_quantity || item.quantity > max_quantity {
            violations.push(
                format!("items[{}].quantity", index),
                format!("must be between {} and {}", min_quantity, max_quantity),
            );
        }

        check_unit_price(&mut violations, index, item.unit_price, limits);
    }

    // out-of-range quantities are already reported above
    let lines: Option<Vec<(u32, Decimal)>> = request
        .items
        .iter()
        .map(|item| u32::try_from(item.quantity).ok().map(|quantity| (quantity, item.unit_price)))
        .collect();
    if let Some(lines) = lines {
        if compute_total(lines).is_err() {
            violations.push("items", "order total exceeds the supported range");
        }
    }

    violations.into_result()
}

fn check_unit_price(violations: &mut Violations, index: usize, price: Decimal, limits: &OrderLimits) {
    let field = format!("items[{}].unitPrice", index);

    if price < limits.min_unit_price || price > limits.max_unit_price {
        violations.push(
            field.clone(),
            format!("must be between {} and {}", limits.min_unit_price, limits.max_unit_price),
        );
    }

    if price.normalize().scale() > limits.max_price_scale {
        violations.push(
            field,
            format!("must have at most {} decimal places", limits.max_price_scale),
        );
    }
}

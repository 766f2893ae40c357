//! Order status aggregation.
//!
//! The overall status of an order is a pure function of its tests' statuses.
//! Precedence is evaluated top to bottom, first match wins:
//!
//! 1. every test terminal (reported/rejected-equivalent) → `delivered`
//! 2. any test validated or completed → `completed`
//! 3. any test in progress, collected, or resulted → `in-progress`
//! 4. otherwise → `ordered`
//!
//! The match over [`TestStatus`] is exhaustive; a status outside the closed
//! set cannot reach this function because parsing rejects it at the boundary.

use lis_types::{OrderStatus, TestStatus};

/// Derive an order's overall status from its tests' statuses.
///
/// An order with zero tests resolves to the default `ordered` rather than
/// erroring; it is a degenerate but legal input.
pub fn aggregate(statuses: &[TestStatus]) -> OrderStatus {
    if statuses.is_empty() {
        return OrderStatus::Ordered;
    }

    if statuses.iter().all(|s| s.is_terminal()) {
        return OrderStatus::Delivered;
    }

    let any_completed = statuses
        .iter()
        .any(|s| matches!(s, TestStatus::Validated | TestStatus::Completed));
    if any_completed {
        return OrderStatus::Completed;
    }

    let any_underway = statuses.iter().any(|s| {
        matches!(
            s,
            TestStatus::InProgress | TestStatus::Collected | TestStatus::Resulted
        )
    });
    if any_underway {
        return OrderStatus::InProgress;
    }

    OrderStatus::Ordered
}

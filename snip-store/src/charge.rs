//! Request cost accounting.
//!
//! Every store round trip reports a charge in normalized cost units. Paged
//! reads report one charge per page; callers sum them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

// =============================================================================
// Request Charge
// =============================================================================

/// Backend resource consumption of one or more operations
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestCharge(f64);

impl RequestCharge {
    /// No cost
    pub const ZERO: RequestCharge = RequestCharge(0.0);

    /// Wrap a raw cost value
    pub fn new(units: f64) -> Self {
        Self(units)
    }

    /// Raw cost units
    pub fn units(&self) -> f64 {
        self.0
    }

    /// Compare within floating point tolerance
    pub fn approx_eq(&self, other: RequestCharge) -> bool {
        (self.0 - other.0).abs() < 1e-9
    }
}

impl Add for RequestCharge {
    type Output = RequestCharge;

    fn add(self, rhs: RequestCharge) -> RequestCharge {
        RequestCharge(self.0 + rhs.0)
    }
}

impl AddAssign for RequestCharge {
    fn add_assign(&mut self, rhs: RequestCharge) {
        self.0 += rhs.0;
    }
}

impl Sum for RequestCharge {
    fn sum<I: Iterator<Item = RequestCharge>>(iter: I) -> Self {
        iter.fold(RequestCharge::ZERO, Add::add)
    }
}

impl fmt::Display for RequestCharge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

// =============================================================================
// Charge Schedule
// =============================================================================

/// Cost model for backends without native metering.
///
/// A charge is `base + per_kib * ceil(bytes / 1024)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeSchedule {
    /// Base charge of a point read
    pub point_read: f64,
    /// Base charge of an upsert
    pub write: f64,
    /// Base charge of a delete
    pub delete: f64,
    /// Base charge of one query page
    pub query_page: f64,
    /// Additional charge per KiB of document payload
    pub per_kib: f64,
}

impl ChargeSchedule {
    /// Charge for reading a document of `bytes` length
    pub fn read(&self, bytes: usize) -> RequestCharge {
        RequestCharge(self.point_read + self.per_kib * kib(bytes))
    }

    /// Charge for writing a document of `bytes` length
    pub fn upsert(&self, bytes: usize) -> RequestCharge {
        RequestCharge(self.write + self.per_kib * kib(bytes))
    }

    /// Charge for deleting a document
    pub fn remove(&self) -> RequestCharge {
        RequestCharge(self.delete)
    }

    /// Charge for a query page carrying `bytes` of documents
    pub fn page(&self, bytes: usize) -> RequestCharge {
        RequestCharge(self.query_page + self.per_kib * kib(bytes))
    }
}

impl Default for ChargeSchedule {
    fn default() -> Self {
        Self {
            point_read: 1.0,
            write: 5.0,
            delete: 5.0,
            query_page: 2.0,
            per_kib: 0.5,
        }
    }
}

fn kib(bytes: usize) -> f64 {
    bytes.div_ceil(1024) as f64
}

//! # Billing Month
//!
//! The billing cycle key: one invoice per student per month, written
//! `YYYY-MM` on the wire and in the `fee_invoices.billing_month` column.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::INVOICE_DUE_DAY;

/// A calendar month used as the invoice period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BillingMonth {
    first_day: NaiveDate,
}

impl BillingMonth {
    /// Builds a month from year and 1-based month number.
    pub fn new(year: i32, month: u32) -> Result<Self, ValidationError> {
        NaiveDate::from_ymd_opt(year, month, 1)
            .map(|first_day| BillingMonth { first_day })
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "month".to_string(),
                reason: format!("{}-{:02} is not a calendar month", year, month),
            })
    }

    /// The month containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        BillingMonth {
            first_day: date.with_day(1).unwrap_or(date),
        }
    }

    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    pub fn month(&self) -> u32 {
        self.first_day.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    pub fn last_day(&self) -> NaiveDate {
        self.first_day
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(self.first_day)
    }

    /// Invoices fall due on a fixed day of their billing month.
    pub fn due_date(&self) -> NaiveDate {
        self.first_day
            .with_day(INVOICE_DUE_DAY)
            .unwrap_or(self.first_day)
    }
}

impl fmt::Display for BillingMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for BillingMonth {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidFormat {
            field: "month".to_string(),
            reason: "expected YYYY-MM".to_string(),
        };

        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;

        BillingMonth::new(year, month)
    }
}

impl TryFrom<String> for BillingMonth {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BillingMonth> for String {
    fn from(month: BillingMonth) -> Self {
        month.to_string()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

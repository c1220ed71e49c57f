//! # Sequence Codes
//!
//! Human-readable codes issued alongside UUIDs.
//!
//! ```text
//! ┌──────────────────┬────────────────────┬───────────────────────────────┐
//! │ Kind             │ Format             │ Example                       │
//! ├──────────────────┼────────────────────┼───────────────────────────────┤
//! │ Admission        │ STD<yyyy><seq4>    │ STD20250007                   │
//! │ Employee         │ TCH<yy><seq4>      │ TCH250012                     │
//! │ Invoice          │ INV<yy><mm><seq4>  │ INV25030001                   │
//! │ Receipt          │ REC<yy><seq6>      │ REC25000042                   │
//! │ Mobile receipt   │ MREC<yy><seq6>     │ MREC25000003                  │
//! └──────────────────┴────────────────────┴───────────────────────────────┘
//! ```
//!
//! The counter itself lives in the database; this module only knows how
//! prefixes are derived and how codes are written and read back.

use chrono::{Datelike, NaiveDate};

/// The families of sequence codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceKind {
    Admission,
    Employee,
    Invoice,
    Receipt,
    MobileReceipt,
}

impl SequenceKind {
    /// Fixed leading letters.
    pub fn tag(&self) -> &'static str {
        match self {
            SequenceKind::Admission => "STD",
            SequenceKind::Employee => "TCH",
            SequenceKind::Invoice => "INV",
            SequenceKind::Receipt => "REC",
            SequenceKind::MobileReceipt => "MREC",
        }
    }

    /// Zero-padded width of the numeric suffix.
    pub fn width(&self) -> usize {
        match self {
            SequenceKind::Admission | SequenceKind::Employee | SequenceKind::Invoice => 4,
            SequenceKind::Receipt | SequenceKind::MobileReceipt => 6,
        }
    }

    /// Prefix for codes issued on `date`. Each prefix has its own counter.
    pub fn prefix(&self, date: NaiveDate) -> String {
        let yy = date.year().rem_euclid(100);
        match self {
            SequenceKind::Admission => format!("{}{:04}", self.tag(), date.year()),
            SequenceKind::Employee | SequenceKind::Receipt | SequenceKind::MobileReceipt => {
                format!("{}{:02}", self.tag(), yy)
            }
            SequenceKind::Invoice => format!("{}{:02}{:02}", self.tag(), yy, date.month()),
        }
    }
}

/// Writes `prefix` followed by `value` padded to the kind's width.
///
/// Values wider than the width are written in full rather than truncated.
pub fn format_code(kind: SequenceKind, prefix: &str, value: i64) -> String {
    format!("{}{:0width$}", prefix, value, width = kind.width())
}

/// Reads the numeric suffix back out of a code issued under `prefix`.
pub fn parse_suffix(prefix: &str, code: &str) -> Option<i64> {
    code.strip_prefix(prefix)
        .filter(|suffix| !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()))
        .and_then(|suffix| suffix.parse().ok())
}

//! Partial-update statement builder.
//!
//! ```text
//! StudentUpdate { first_name: Some("Amina"), class_id: None, guardian_phone: Some(..) }
//!      │
//!      ▼
//! UPDATE students SET first_name = ?, guardian_phone = ?, updated_at = ?
//! WHERE id = ? AND is_active = 1
//! ```
//!
//! Column names are always `&'static str` literals from the repositories;
//! values are bound, never interpolated.

use sqlx::{Encode, QueryBuilder, Sqlite, Type};

pub(crate) struct UpdateBuilder<'a> {
    qb: QueryBuilder<'a, Sqlite>,
    fields: usize,
}

impl<'a> UpdateBuilder<'a> {
    pub(crate) fn new(table: &'static str) -> Self {
        UpdateBuilder {
            qb: QueryBuilder::new(format!("UPDATE {} SET ", table)),
            fields: 0,
        }
    }

    /// Adds `column = ?` when `value` is present.
    pub(crate) fn set<T>(&mut self, column: &'static str, value: Option<T>) -> &mut Self
    where
        T: 'a + Encode<'a, Sqlite> + Type<Sqlite> + Send,
    {
        if let Some(value) = value {
            if self.fields > 0 {
                self.qb.push(", ");
            }
            self.qb.push(column).push(" = ").push_bind(value);
            self.fields += 1;
        }
        self
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.fields == 0
    }

    /// Appends an unconditional assignment (e.g. `updated_at`), then the
    /// `WHERE id = ?` clause plus an optional extra predicate.
    pub(crate) fn finish<T>(
        mut self,
        stamp: Option<(&'static str, T)>,
        id: &'a str,
        extra_predicate: &'static str,
    ) -> QueryBuilder<'a, Sqlite>
    where
        T: 'a + Encode<'a, Sqlite> + Type<Sqlite> + Send,
    {
        if let Some((column, value)) = stamp {
            if self.fields > 0 {
                self.qb.push(", ");
            }
            self.qb.push(column).push(" = ").push_bind(value);
        }
        self.qb.push(" WHERE id = ").push_bind(id);
        if !extra_predicate.is_empty() {
            self.qb.push(" AND ").push(extra_predicate);
        }
        self.qb
    }
}

//! Result accumulator for bulk endpoints (attendance, exam results,
//! student import, class invoicing). A failing row never aborts the batch.

use serde::Serialize;

/// One rejected row: the submitted data plus the error message.
#[derive(Debug, Clone, Serialize)]
pub struct BulkFailure<F> {
    pub data: F,
    pub error: String,
}

/// `{ success: [...], failed: [{ data, error }] }`
#[derive(Debug, Clone, Serialize)]
pub struct BulkResult<S, F> {
    pub success: Vec<S>,
    pub failed: Vec<BulkFailure<F>>,
}

impl<S, F> Default for BulkResult<S, F> {
    fn default() -> Self {
        BulkResult {
            success: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<S, F> BulkResult<S, F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_success(&mut self, item: S) {
        self.success.push(item);
    }

    pub fn push_failure(&mut self, data: F, error: impl ToString) {
        self.failed.push(BulkFailure {
            data,
            error: error.to_string(),
        });
    }

    /// Records the outcome of one row.
    pub fn record<E: ToString>(&mut self, data: F, outcome: Result<S, E>) {
        match outcome {
            Ok(item) => self.push_success(item),
            Err(e) => self.push_failure(data, e),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_both_sides() {
        let mut result: BulkResult<u32, &str> = BulkResult::new();
        result.record("a", Ok::<_, String>(1));
        result.record("b", Err::<u32, _>("score out of range"));
        result.record("c", Ok::<_, String>(3));

        assert_eq!(result.success, vec![1, 3]);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].data, "b");
        assert!(!result.is_clean());
    }

    #[test]
    fn test_wire_shape() {
        let mut result: BulkResult<&str, &str> = BulkResult::new();
        result.push_failure("row", "bad");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": [], "failed": [{ "data": "row", "error": "bad" }] })
        );
    }
}

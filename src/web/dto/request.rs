//! Request DTOs for the HTTP API.

use serde::Deserialize;

/// Query parameters of `GET /api/conversations/:id/messages`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct HistoryQuery {
    /// Return only messages after this id.
    pub since_id: Option<i64>,
    /// Page size; server default when absent, capped at the server maximum.
    pub limit: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_query_defaults() {
        let q: HistoryQuery = serde_json::from_str("{}").unwrap();
        assert!(q.since_id.is_none());
        assert!(q.limit.is_none());
    }

    #[test]
    fn test_history_query_values() {
        let q: HistoryQuery = serde_json::from_str(r#"{"since_id":2,"limit":10}"#).unwrap();
        assert_eq!(q.since_id, Some(2));
        assert_eq!(q.limit, Some(10));
    }
}

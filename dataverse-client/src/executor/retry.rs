//! Auto-retry eligibility for retrieve queries.

/// Entities whose retrieve queries are retried on transient failure.
pub const AUTO_RETRY_RETRIEVE_ENTITIES: &[&str] = &["asyncoperation", "importjob"];

/// Returns true if a retrieve `query` targets an auto-retry entity.
///
/// This is a plain substring test on the query text.
pub fn should_auto_retry_retrieve(query: &str) -> bool {
    AUTO_RETRY_RETRIEVE_ENTITIES
        .iter()
        .any(|entity| query.contains(entity))
}

//! Owner normalization and vector-collection naming.
//!
//! Tenancy is a scoping parameter passed to every call (`owner: &str`), not
//! a field baked into a component instance, so one repository/vector-store
//! instance serves every tenant. This module is the single place that knows
//! how an owner identifier maps onto storage names.

/// Normalize an owner identifier (typically an email address) into a form
/// safe for use as a storage-name segment: `@` and `.` become `_`.
pub fn normalize_owner(owner: &str) -> String {
    owner.replace('@', "_").replace('.', "_")
}

/// Per-source ingest-pending inventory collection: `{owner}_{source}_knowledge`.
pub fn collection_name(owner: &str, source: &str) -> String {
    format!("{}_{}_knowledge", normalize_owner(owner), source)
}

/// The embedded-points collection shared across all sources for an owner.
pub fn knowledge_base_collection(owner: &str) -> String {
    format!("{}_knowledge_base", normalize_owner(owner))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_email_like_owners() {
        assert_eq!(normalize_owner("jane.doe@example.com"), "jane_doe_example_com");
    }

    #[test]
    fn derives_per_source_collection_names() {
        assert_eq!(
            collection_name("jane@example.com", "sharepoint"),
            "jane_example_com_sharepoint_knowledge"
        );
        assert_eq!(
            knowledge_base_collection("jane@example.com"),
            "jane_example_com_knowledge_base"
        );
    }
}

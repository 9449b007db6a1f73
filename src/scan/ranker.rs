use super::types::ContactResult;

/// Order results by most recent message first. Contacts without a date sort
/// last; ties keep their scan order.
pub fn rank(mut results: Vec<ContactResult>) -> Vec<ContactResult> {
    // `None < Some(_)`, so reversing the comparison puts undated entries last.
    results.sort_by(|a, b| b.date.cmp(&a.date));
    results
}

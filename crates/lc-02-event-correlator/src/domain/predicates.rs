//! Predicates over notifications.
//!
//! A predicate is any `Fn(&Notification) -> bool`. It runs on the
//! correlator's delivery task, outside the waiter registry lock, so it may
//! query the correlator. It must not block: every waiter on the channel
//! waits for it. A predicate that panics fails its own waiter with
//! `PredicatePanicked`.

use serde_json::Value;
use shared_types::Notification;
use std::sync::Arc;

/// Shared predicate.
pub type Predicate = Arc<dyn Fn(&Notification) -> bool + Send + Sync>;

/// Wrap a closure.
pub fn predicate<F>(f: F) -> Predicate
where
    F: Fn(&Notification) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Matches every notification.
pub fn any() -> Predicate {
    Arc::new(|_| true)
}

/// `payload[key] == expected`.
pub fn field_equals(key: impl Into<String>, expected: Value) -> Predicate {
    let key = key.into();
    Arc::new(move |n: &Notification| n.get(&key) == Some(&expected))
}

/// String field comparison ignoring ASCII case. Hex-encoded addresses and
/// hashes come back in mixed case from some nodes.
pub fn field_equals_ignore_case(key: impl Into<String>, expected: impl Into<String>) -> Predicate {
    let key = key.into();
    let expected = expected.into();
    Arc::new(move |n: &Notification| {
        n.get_str(&key)
            .is_some_and(|actual| actual.eq_ignore_ascii_case(&expected))
    })
}

/// Every predicate matches.
pub fn all(predicates: Vec<Predicate>) -> Predicate {
    Arc::new(move |n: &Notification| predicates.iter().all(|p| p(n)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::Payload;

    fn winner(request_id: &str, winner: &str) -> Notification {
        let mut payload = Payload::new();
        payload.insert("requestId".into(), json!(request_id));
        payload.insert("winner".into(), json!(winner));
        Notification::new("WinnerPicked", payload)
    }

    #[test]
    fn test_field_equals() {
        let p = field_equals("requestId", json!("0x01"));
        assert!(p(&winner("0x01", "0xaa")));
        assert!(!p(&winner("0x02", "0xaa")));
    }

    #[test]
    fn test_ignore_case() {
        let p = field_equals_ignore_case("winner", "0xABCDEF");
        assert!(p(&winner("0x01", "0xabcdef")));
        assert!(!field_equals_ignore_case("missing", "x")(&winner("0x01", "0xab")));
    }

    #[test]
    fn test_all_and_any() {
        let p = all(vec![
            any(),
            field_equals("requestId", json!("0x01")),
            predicate(|n| n.channel == "WinnerPicked"),
        ]);
        assert!(p(&winner("0x01", "0xaa")));
        assert!(!p(&winner("0x03", "0xaa")));
    }
}

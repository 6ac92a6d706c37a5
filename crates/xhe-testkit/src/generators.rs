//! Proptest generators for property-based testing.

use std::collections::BTreeSet;

use proptest::prelude::*;
use serde_json::{Map, Number, Value};

use xhe_core::capability::{ADMIN, DELEGATE, KARMA_GRANT, READ, SOCIAL_POST, STORAGE, WILDCARD, WRITE};
use xhe_core::{PulseHash, PulseType};

/// Generate a random PulseHash.
pub fn pulse_hash() -> impl Strategy<Value = PulseHash> {
    any::<[u8; 32]>().prop_map(PulseHash::from_bytes)
}

/// A well-known pulse type or an application-defined one.
pub fn pulse_type() -> impl Strategy<Value = PulseType> {
    prop_oneof![
        Just(PulseType::IDENTITY_CREATE),
        Just(PulseType::POLICY_KEY_ISSUE),
        Just(PulseType::KARMA_CHANGE),
        Just(PulseType::SOCIAL_POST),
        Just(PulseType::API_CALL),
        "[A-Z][A-Z_]{2,15}".prop_map(PulseType::new),
    ]
}

/// Scalar JSON values. Floats stay finite so they survive JSON.
pub fn json_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        (-1.0e9f64..1.0e9).prop_map(|f| Number::from_f64(f).map_or(Value::Null, Value::Number)),
        "[a-zA-Z0-9 _:-]{0,24}".prop_map(Value::String),
    ]
}

/// Nested JSON values up to a few levels deep.
pub fn json_value() -> impl Strategy<Value = Value> {
    json_leaf().prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,10}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// An object payload.
pub fn json_payload() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-zA-Z_]{1,12}", json_value(), 0..8)
        .prop_map(|m| Value::Object(m.into_iter().collect()))
}

/// A non-empty set drawn from the standard capabilities and the wildcard.
pub fn capability_set() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(
        prop::sample::select(vec![READ, WRITE, SOCIAL_POST, KARMA_GRANT, STORAGE, DELEGATE, ADMIN, WILDCARD]),
        1..4,
    )
    .prop_map(|set| set.into_iter().map(str::to_owned).collect())
}

/// A holder DID.
pub fn did() -> impl Strategy<Value = String> {
    "[0-9a-f]{32}".prop_map(|s| format!("did:xhe:{}", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use xhe_core::Pulse;
    use xhe_perms::{evaluate, Denial, PolicyKey};

    proptest! {
        #[test]
        fn hash_ignores_timestamp(kind in pulse_type(), payload in json_payload(), a in any::<i64>(), b in any::<i64>()) {
            let first = Pulse::new(0, kind.clone(), payload.clone(), None, a);
            let second = Pulse::new(0, kind, payload, None, b);
            prop_assert_eq!(first.hash, second.hash);
        }

        #[test]
        fn persisted_form_verifies(index in 0u64..1_000_000, kind in pulse_type(), payload in json_payload(), parent in proptest::option::of(pulse_hash())) {
            let pulse = Pulse::new(index, kind, payload, parent, 0);
            let text = serde_json::to_string(&pulse.to_value().unwrap()).unwrap();
            let back = Pulse::from_value(serde_json::from_str(&text).unwrap()).unwrap();
            prop_assert!(back.verify());
            prop_assert_eq!(back.hash, pulse.hash);
        }

        #[test]
        fn index_changes_hash(payload in json_payload(), index in 0u64..1_000) {
            let a = Pulse::new(index, PulseType::API_CALL, payload.clone(), None, 0);
            let b = Pulse::new(index + 1, PulseType::API_CALL, payload, None, 0);
            prop_assert_ne!(a.hash, b.hash);
        }

        #[test]
        fn key_serves_only_its_holder(holder in did(), other in did(), caps in capability_set()) {
            prop_assume!(holder != other);
            let key = PolicyKey::new("key", holder.clone(), caps.clone(), None, 0);
            let held: Vec<&str> = caps.iter().map(String::as_str).collect();

            prop_assert_eq!(evaluate(Some(&key), &holder, &held, 0), Ok(()));
            prop_assert_eq!(evaluate(Some(&key), &other, &held, 0), Err(Denial::WrongHolder));
            prop_assert_eq!(
                evaluate(Some(&key), &holder, &[ADMIN], 0).is_ok(),
                caps.contains(WILDCARD) || caps.contains(ADMIN)
            );

            let mut revoked = key;
            revoked.revoke(1);
            prop_assert_eq!(evaluate(Some(&revoked), &holder, &held, 1), Err(Denial::Revoked));
        }
    }
}

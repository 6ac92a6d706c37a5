//! The capability registry.
//!
//! A static table of named capabilities and the operations each one
//! authorizes, plus the gate table naming the capability an application must
//! hold to invoke each gated operation. Policy keys carry capability names;
//! the wildcard `*` on a key authorizes everything.

use std::fmt;

/// Read ledger data, fetch content, view karma.
pub const READ: &str = "READ";
/// Submit pulses, store content.
pub const WRITE: &str = "WRITE";
/// Create posts, reply to threads.
pub const SOCIAL_POST: &str = "SOCIAL_POST";
/// Award karma to users.
pub const KARMA_GRANT: &str = "KARMA_GRANT";
/// Access content storage.
pub const STORAGE: &str = "STORAGE";
/// Issue sub-policy keys.
pub const DELEGATE: &str = "DELEGATE";
/// Full system access.
pub const ADMIN: &str = "ADMIN";
/// Wildcard capability: a key holding it passes every check.
pub const WILDCARD: &str = "*";

/// Gated gateway operations.
pub mod ops {
    pub const SUBMIT_PULSE: &str = "submitPulse";
    pub const STORE_CONTENT: &str = "storeContent";
    pub const RETRIEVE_CONTENT: &str = "retrieveContent";
    pub const REWARD_KARMA: &str = "rewardKarma";
    pub const CREATE_POST: &str = "createPost";
    pub const DERIVE_POLICY_KEY: &str = "derivePolicyKey";
}

/// One row of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilitySpec {
    pub name: &'static str,
    pub description: &'static str,
    pub operations: &'static [&'static str],
}

impl CapabilitySpec {
    /// Whether this capability covers `operation`.
    pub fn covers(&self, operation: &str) -> bool {
        self.operations.iter().any(|op| *op == operation || *op == WILDCARD)
    }
}

impl fmt::Display for CapabilitySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.description)
    }
}

static STANDARD: &[CapabilitySpec] = &[
    CapabilitySpec {
        name: READ,
        description: "Read ledger data, fetch content, view karma",
        operations: &["query", "fetch", "view"],
    },
    CapabilitySpec {
        name: WRITE,
        description: "Submit pulses, store content",
        operations: &[ops::SUBMIT_PULSE, ops::STORE_CONTENT],
    },
    CapabilitySpec {
        name: SOCIAL_POST,
        description: "Create posts, reply to threads",
        operations: &[ops::CREATE_POST, "reply"],
    },
    CapabilitySpec {
        name: KARMA_GRANT,
        description: "Award karma to users",
        operations: &[ops::REWARD_KARMA],
    },
    CapabilitySpec {
        name: STORAGE,
        description: "Access content storage",
        operations: &[ops::STORE_CONTENT, ops::RETRIEVE_CONTENT, "pin"],
    },
    CapabilitySpec {
        name: DELEGATE,
        description: "Issue sub-policy keys",
        operations: &[ops::DERIVE_POLICY_KEY],
    },
    CapabilitySpec {
        name: ADMIN,
        description: "Full system access",
        operations: &[WILDCARD],
    },
];

/// Operation -> capability an application key must hold for it.
static GATES: &[(&str, &str)] = &[
    (ops::SUBMIT_PULSE, WRITE),
    (ops::STORE_CONTENT, STORAGE),
    (ops::REWARD_KARMA, KARMA_GRANT),
    (ops::CREATE_POST, SOCIAL_POST),
    (ops::DERIVE_POLICY_KEY, DELEGATE),
];

/// Static capability table.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityRegistry {
    specs: &'static [CapabilitySpec],
    gates: &'static [(&'static str, &'static str)],
}

impl CapabilityRegistry {
    /// The built-in table.
    pub const fn standard() -> Self {
        Self {
            specs: STANDARD,
            gates: GATES,
        }
    }

    /// Look up a capability by name.
    pub fn get(&self, name: &str) -> Option<&'static CapabilitySpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    /// Whether `name` is a registered capability or the wildcard.
    pub fn is_known(&self, name: &str) -> bool {
        name == WILDCARD || self.get(name).is_some()
    }

    /// Whether holding `capability` authorizes `operation` per the table.
    pub fn authorizes(&self, capability: &str, operation: &str) -> bool {
        capability == WILDCARD || self.get(capability).is_some_and(|s| s.covers(operation))
    }

    /// The capability a key must carry to invoke a gated operation.
    pub fn required_for(&self, operation: &str) -> Option<&'static str> {
        self.gates
            .iter()
            .find(|(op, _)| *op == operation)
            .map(|(_, cap)| *cap)
    }

    /// All registered capabilities.
    pub fn iter(&self) -> impl Iterator<Item = &'static CapabilitySpec> {
        self.specs.iter()
    }

    /// Return the first name in `names` that is not a known capability.
    pub fn first_unknown<'a, I>(&self, names: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names.into_iter().find(|n| !self.is_known(n))
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let reg = CapabilityRegistry::standard();
        assert_eq!(reg.get(WRITE).unwrap().operations, &["submitPulse", "storeContent"]);
        assert!(reg.get("NOPE").is_none());
        assert!(reg.is_known(WILDCARD));
        assert!(!reg.is_known("NOPE"));
    }

    #[test]
    fn test_authorizes() {
        let reg = CapabilityRegistry::standard();
        assert!(reg.authorizes(WRITE, ops::SUBMIT_PULSE));
        assert!(!reg.authorizes(READ, ops::SUBMIT_PULSE));
        assert!(reg.authorizes(ADMIN, "anything"));
        assert!(reg.authorizes(WILDCARD, "anything"));
    }

    #[test]
    fn test_every_gate_is_covered_by_its_capability() {
        let reg = CapabilityRegistry::standard();
        for (op, cap) in GATES {
            assert!(reg.authorizes(cap, op), "{} does not cover {}", cap, op);
        }
        assert_eq!(reg.required_for(ops::SUBMIT_PULSE), Some(WRITE));
        assert_eq!(reg.required_for("query"), None);
    }

    #[test]
    fn test_first_unknown() {
        let reg = CapabilityRegistry::standard();
        assert_eq!(reg.first_unknown(["WRITE", "*", "BOGUS"]), Some("BOGUS"));
        assert_eq!(reg.first_unknown(["WRITE", "STORAGE"]), None);
    }
}

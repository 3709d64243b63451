//! Per-agent key/value store split into private and shared (spec §4.8, §3).
//!
//! Only ever touched from its owning Agent's single message-handling context (spec §4.8
//! "Concurrency"), so it carries no internal locking — a plain struct, not an actor.

use serde_json::Value;
use std::collections::{HashMap, HashSet};

pub struct ContextProvider {
    private: HashMap<String, Value>,
    shared: HashMap<String, Value>,
    shared_eligible: HashSet<String>,
}

impl ContextProvider {
    /// `shared_eligible` names the variables that broadcast on write (spec §3).
    pub fn new(shared_eligible: HashSet<String>) -> Self {
        Self { private: HashMap::new(), shared: HashMap::new(), shared_eligible }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.shared.get(key).or_else(|| self.private.get(key))
    }

    /// Writes `key`. Shared-eligible keys go to `shared` and the write is reported back via
    /// the returned `bool` (true when a broadcast should fire); everything else goes to
    /// `private`. A key lives in exactly one of the two maps (spec §4.8 invariant).
    pub fn set(&mut self, key: &str, value: Value) -> bool {
        if self.shared_eligible.contains(key) {
            self.private.remove(key);
            self.shared.insert(key.to_string(), value);
            true
        } else {
            self.shared.remove(key);
            self.private.insert(key.to_string(), value);
            false
        }
    }

    pub fn drop_key(&mut self, key: &str) {
        self.private.remove(key);
        self.shared.remove(key);
    }

    /// First-write-wins merge of an inbound broadcast: existing keys are never overwritten.
    pub fn merge_shared(&mut self, updates: HashMap<String, Value>) {
        for (k, v) in updates {
            self.shared.entry(k).or_insert(v);
        }
    }
}

//! Waitlist signup row (`WAITLIST#<email> / WAITLIST#<email>`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use questforge_core::store::{keys, Item};

use super::now_ms;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitlistEntry {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub email: String,
    pub created_at: i64,
}

impl WaitlistEntry {
    pub fn new(email: String) -> Self {
        Self {
            entity_type: "WaitlistEntry".to_string(),
            email,
            created_at: now_ms(),
        }
    }

    pub fn item(&self) -> Item {
        let (pk, sk) = keys::waitlist_entry(&self.email);
        let mut keys_map = HashMap::new();
        keys_map.insert("pk", pk);
        keys_map.insert("sk", sk);
        questforge_core::store::marshal(self, keys_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_uses_email_as_both_key_parts() {
        let entry = WaitlistEntry::new("ada@example.com".into());
        let item = entry.item();
        assert_eq!(item.get("pk").unwrap().as_str().unwrap(), "WAITLIST#ada@example.com");
        assert_eq!(item.get("sk").unwrap().as_str().unwrap(), "WAITLIST#ada@example.com");
    }
}

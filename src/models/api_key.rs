use serde::{Deserialize, Serialize};

/// API key record as stored under its owner.
/// `id` is the store's handle for re-reading the record inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub id: String,
    pub owner_id: String,
    pub key: String,
    pub usage: i64,
}

impl ApiKeyRecord {
    /// Whether the recorded usage has reached the quota ceiling
    pub fn is_exhausted(&self, quota: i64) -> bool {
        self.usage >= quota
    }
}

/// Key provisioned through configuration for the in-memory backend
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedApiKey {
    pub owner: String,
    pub key: String,
    #[serde(default)]
    pub usage: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_exhausted() {
        let mut record = ApiKeyRecord {
            id: "1".to_string(),
            owner_id: "owner".to_string(),
            key: "secret".to_string(),
            usage: 4,
        };
        assert!(!record.is_exhausted(5));

        record.usage = 5;
        assert!(record.is_exhausted(5));

        record.usage = 9;
        assert!(record.is_exhausted(5));
    }

    #[test]
    fn test_seed_api_key_deserialization() {
        let json = r#"[{"owner":"alice","key":"k1"},{"owner":"bob","key":"k2","usage":3}]"#;
        let seeds: Vec<SeedApiKey> = serde_json::from_str(json).unwrap();

        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[0].usage, 0);
        assert_eq!(seeds[1].owner, "bob");
        assert_eq!(seeds[1].usage, 3);
    }
}

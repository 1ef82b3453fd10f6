use crate::store::{Model, PrefetchCache};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Account row kept by the demo store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(skip)]
    pub prefetched: PrefetchCache,
}

fn active_by_default() -> bool {
    true
}

impl Account {
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            email: None,
            is_active: true,
            groups: Vec::new(),
            prefetched: PrefetchCache::new(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

impl Model for Account {
    const NAME: &'static str = "Account";

    fn pk(&self) -> Value {
        Value::from(self.id)
    }

    fn prefetched_objects_cache(&mut self) -> Option<&mut PrefetchCache> {
        Some(&mut self.prefetched)
    }
}

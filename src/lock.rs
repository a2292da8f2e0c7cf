//! Lock information stored inside the state secret

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Information about a held state lock
///
/// The serialized form of this record lives in the state secret's
/// `lock-info` data field while the lock is held. An empty or absent field
/// means the state is unlocked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Unique identifier for this lock acquisition
    pub id: String,
    /// The operation being performed (e.g., "apply", "destroy", "plan")
    pub operation: String,
    /// Free-form extra information about the lock
    #[serde(default)]
    pub info: String,
    /// Who acquired the lock (username@hostname)
    pub who: String,
    /// When the lock was created
    pub created: DateTime<Utc>,
}

impl LockInfo {
    /// Create a new lock record for an operation
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation: operation.into(),
            info: String::new(),
            who: get_lock_owner(),
            created: Utc::now(),
        }
    }

    /// Attach free-form information to the lock record
    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = info.into();
        self
    }
}

/// Get the lock owner string (username@hostname)
fn get_lock_owner() -> String {
    let username = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    format!("{}@{}", username, hostname)
}

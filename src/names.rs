//! Secret naming and classification labels
//!
//! A workspace's state lives in exactly one secret whose name is a pure
//! function of `(workspace, secret_suffix)`. The canonical scheme hashes the
//! pair and base32-encodes a short prefix of the digest, which keeps names
//! inside the API server's length limit and independent of whatever
//! characters appear in the workspace name. Workspace and suffix are
//! recorded in labels so enumeration never has to reverse the hash.
//!
//! Two older naming generations concatenated the workspace and suffix into
//! the secret name directly. Secrets written that way are still recognized
//! during enumeration; all new writes use the hash scheme.

use base32::Alphabet;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::store::StorageObject;
use crate::workspaces::DEFAULT_WORKSPACE;

/// Prefix for every state secret name
pub const SECRET_PREFIX: &str = "kubestate";

/// Label marking a secret as a state secret
pub const LABEL_STATE: &str = "kubestate";
/// Label recording the secret suffix (partition key)
pub const LABEL_KEY: &str = "kubestate-key";
/// Label recording the workspace name
pub const LABEL_WORKSPACE: &str = "kubestate-workspace";

/// Data field holding the compressed state payload
pub const STATE_FIELD: &str = "state";
/// Data field holding the serialized lock record
pub const LOCK_FIELD: &str = "lock-info";

/// Canonical secret name for a `(workspace, suffix)` pair
///
/// `sha256("workspace/suffix")`, base32 without padding, first 10 characters
/// lower-cased, behind the fixed prefix.
pub fn secret_name(workspace: &str, suffix: &str) -> String {
    let digest = Sha256::digest(format!("{}/{}", workspace, suffix));
    let encoded = base32::encode(Alphabet::Rfc4648 { padding: false }, &digest);
    format!("{}-{}", SECRET_PREFIX, encoded[..10].to_lowercase())
}

/// Classification labels applied to every state secret on creation
pub fn state_labels(workspace: &str, suffix: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_STATE.to_string(), "true".to_string()),
        (LABEL_KEY.to_string(), suffix.to_string()),
        (LABEL_WORKSPACE.to_string(), workspace.to_string()),
    ])
}

/// Label selector matching all state secrets in a namespace
pub fn state_selector() -> BTreeMap<String, String> {
    BTreeMap::from([(LABEL_STATE.to_string(), "true".to_string())])
}

type Recognizer = fn(&StorageObject, &str) -> Option<String>;

/// Naming generations, newest first
///
/// Tried in order when mapping a listed secret back to a workspace name.
const RECOGNIZERS: &[Recognizer] = &[by_labels, by_suffixed_name, by_bare_name];

/// Recover the workspace name from a listed state secret, if it belongs to
/// the given suffix under any known naming generation
pub fn recognize(object: &StorageObject, suffix: &str) -> Option<String> {
    RECOGNIZERS
        .iter()
        .find_map(|recognizer| recognizer(object, suffix))
}

/// Current generation: hash-based name, workspace carried in labels
fn by_labels(object: &StorageObject, suffix: &str) -> Option<String> {
    if object.labels.get(LABEL_KEY).map(String::as_str) != Some(suffix) {
        return None;
    }
    object.labels.get(LABEL_WORKSPACE).cloned()
}

/// Legacy generation: `<prefix>-<workspace>-<suffix>`
fn by_suffixed_name(object: &StorageObject, suffix: &str) -> Option<String> {
    let rest = object.name.strip_prefix(SECRET_PREFIX)?.strip_prefix('-')?;
    let workspace = rest.strip_suffix(suffix)?.strip_suffix('-')?;
    if workspace.is_empty() {
        return None;
    }
    Some(workspace.to_string())
}

/// Oldest generation: `<prefix>-<suffix>`, the default workspace omitted
/// from the name entirely
fn by_bare_name(object: &StorageObject, suffix: &str) -> Option<String> {
    if object.name == format!("{}-{}", SECRET_PREFIX, suffix) {
        return Some(DEFAULT_WORKSPACE.to_string());
    }
    None
}

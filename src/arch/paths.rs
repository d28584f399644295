use std::path::{Path, PathBuf};

/// Where 10.5/10.6 keep per-user SHA1 hash files, keyed by GeneratedUID.
pub const LEGACY_HASH_DIR: &str = "/var/db/shadow/hash";

/// The local directory node's user records (one binary plist per user).
pub const USERS_PLIST_DIR: &str = "/var/db/dslocal/nodes/Default/users";

pub fn legacy_hash_path(dir: &Path, guid: &str) -> PathBuf {
    dir.join(guid)
}

pub fn user_plist_path(dir: &Path, user: &str) -> PathBuf {
    dir.join(format!("{user}.plist"))
}

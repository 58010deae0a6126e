//! Task id generation

use uuid::Uuid;

/// Generate a prefixed unique id
///
/// Uses UUIDv7 so ids are time-ordered and never reused within the process.
pub fn generate_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::now_v7().simple())
}

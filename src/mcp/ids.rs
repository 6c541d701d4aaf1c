//! Opaque identifiers for connections and sessions.
//!
//! Identifiers are random v4 UUIDs behind a short kind prefix, so a connection
//! id can never be mistaken for a session id in logs or tool arguments.

use uuid::Uuid;

const CONNECTION_PREFIX: &str = "conn";
const SESSION_PREFIX: &str = "sess";

fn generate(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

/// Generate a fresh connection identifier.
pub fn connection_id() -> String {
    generate(CONNECTION_PREFIX)
}

/// Generate a fresh session identifier.
pub fn session_id() -> String {
    generate(SESSION_PREFIX)
}

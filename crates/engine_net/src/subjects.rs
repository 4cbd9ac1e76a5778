//! NATS subject hierarchy for the view transport.
//!
//! All subjects live under a configurable prefix (default `engine.view`) so
//! several servers can share one NATS cluster:
//!
//! - `{prefix}.connect`: clients announce themselves.
//! - `{prefix}.disconnect`: clients leave.
//! - `{prefix}.client.<uuid>.up`: client → server ops.
//! - `{prefix}.client.<uuid>.down`: server → client ops.

use uuid::Uuid;

/// Default root prefix for view subjects.
pub const DEFAULT_PREFIX: &str = "engine.view";

/// `{prefix}.connect`
#[must_use]
pub fn connect(prefix: &str) -> String {
    format!("{prefix}.connect")
}

/// `{prefix}.disconnect`
#[must_use]
pub fn disconnect(prefix: &str) -> String {
    format!("{prefix}.disconnect")
}

/// `{prefix}.client.<uuid>.up`
#[must_use]
pub fn client_up(prefix: &str, client: Uuid) -> String {
    format!("{prefix}.client.{client}.up")
}

/// `{prefix}.client.<uuid>.down`
#[must_use]
pub fn client_down(prefix: &str, client: Uuid) -> String {
    format!("{prefix}.client.{client}.down")
}

/// Wildcard matching every client's up subject.
#[must_use]
pub fn all_client_up(prefix: &str) -> String {
    format!("{prefix}.client.*.up")
}

/// Extract the client uuid from an up subject.
#[must_use]
pub fn parse_client_up(prefix: &str, subject: &str) -> Option<Uuid> {
    let id = subject
        .strip_prefix(prefix)?
        .strip_prefix(".client.")?
        .strip_suffix(".up")?;
    Uuid::parse_str(id).ok()
}

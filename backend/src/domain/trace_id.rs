//! Correlation id shared by log lines and error payloads of one request.
//!
//! The `Trace` middleware opens a scope per request; anything awaited inside
//! it, down to the ledger service, reads the id with [`TraceId::current`].
//! Work handed to `tokio::spawn` or `spawn_blocking` leaves the scope and
//! sees `None` unless it is wrapped in [`TraceId::scope`] again.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use tokio::task_local;
use uuid::Uuid;

/// Name of the response header that echoes the id back to the caller.
pub const TRACE_ID_HEADER: &str = "trace-id";

task_local! {
    static CURRENT: TraceId;
}

/// Random v4 UUID naming one request.
///
/// # Examples
/// ```
/// use contact_ledger::domain::TraceId;
///
/// assert!(TraceId::current().is_none());
/// let id: TraceId = "6f9619ff-8b86-4011-b42d-00c04fc964ff".parse().expect("uuid text");
/// assert_eq!(id.to_string(), "6f9619ff-8b86-4011-b42d-00c04fc964ff");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceId(Uuid);

impl TraceId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// The id of the request being served, or `None` outside a scope.
    #[must_use]
    pub fn current() -> Option<Self> {
        CURRENT.try_with(|id| *id).ok()
    }

    /// Await `fut` with `trace_id` installed as the current id.
    pub async fn scope<Fut>(trace_id: TraceId, fut: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        CURRENT.scope(trace_id, fut).await
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for TraceId {
    type Err = uuid::Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(text).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[tokio::test]
    async fn scope_installs_the_id_for_awaited_work() {
        let id = TraceId::generate();
        let seen = TraceId::scope(id, async { TraceId::current() }).await;
        assert_eq!(seen, Some(id));
    }

    #[tokio::test]
    async fn nested_scope_shadows_the_outer_id() {
        let outer = TraceId::generate();
        let inner = TraceId::generate();
        let seen = TraceId::scope(outer, async move {
            let nested = TraceId::scope(inner, async { TraceId::current() }).await;
            (nested, TraceId::current())
        })
        .await;
        assert_eq!(seen, (Some(inner), Some(outer)));
    }

    #[tokio::test]
    async fn no_id_outside_a_scope() {
        assert!(TraceId::current().is_none());
    }

    #[rstest]
    #[case("00000000-0000-0000-0000-000000000000", true)]
    #[case("6F9619FF-8B86-4011-B42D-00C04FC964FF", true)]
    #[case("not-a-uuid", false)]
    #[case("", false)]
    fn parses_uuid_text(#[case] text: &str, #[case] valid: bool) {
        let parsed = text.parse::<TraceId>();
        assert_eq!(parsed.is_ok(), valid);
        if let Ok(id) = parsed {
            assert_eq!(id.to_string(), text.to_ascii_lowercase());
        }
    }
}

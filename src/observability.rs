//! Shared tracing configuration for observability instrumentation.
//!
//! Centralises the log targets used by the crate so subscribers can filter
//! launcher events without pulling in unrelated application logs.

/// Target used by provisioning spans and logs.
pub(crate) const LOG_TARGET: &str = "reproto::observability";

/// Target used by version-cache and archive-cache events.
pub(crate) const CACHE_LOG_TARGET: &str = "reproto::cache";

/// Target carrying the tool's own output lines.
pub(crate) const TOOL_LOG_TARGET: &str = "reproto::tool";

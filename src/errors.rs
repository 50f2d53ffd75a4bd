//! Error taxonomy for the layout core.
//!
//! Nothing here is user-fatal: a connector that cannot be laid out is
//! skipped (and logged by the caller) so the rest of the score still
//! renders. Degenerate zero-length spans are not errors at all; they set
//! the connector's `broken` flag and suppress stroke output.

use thiserror::Error;

use crate::types::Tick;

/// Recoverable layout failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// The connector's start chord-rest (or its measure) is absent.
    ///
    /// This happens transiently while a document is loading or an undo is
    /// replaying; the connector keeps its previous geometry, if any.
    #[error("connector at tick {tick} track {track} has no start anchor")]
    MissingAnchor { tick: Tick, track: usize },

    /// No system in the score's system list covers the given tick.
    #[error("no system found for tick {tick}")]
    SystemNotFound { tick: Tick },
}

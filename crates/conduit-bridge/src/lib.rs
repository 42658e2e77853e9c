//! The bridge between the visual editor state (`conduit_canvas`) and the
//! component spec model (`conduit_core`).
//!
//! It derives the visual graph from a spec, regenerates the spec from the
//! visual graph, and runs the editing session that keeps both, the history
//! and the subgraph path consistent.

pub mod error;
pub mod post_commit;
pub mod session;
pub mod sync;

pub use error::{SyncError, SyncResult};
pub use post_commit::{PostCommitAction, PostCommitQueue};
pub use session::EditorSession;
pub use sync::{SyncOptions, export_spec, graph_to_spec, spec_to_graph};

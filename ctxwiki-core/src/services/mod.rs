// src/services/mod.rs

pub mod coordinator;  // lock, snapshot, write, review, revert, sync
pub mod hierarchy;    // workspace roots + monorepo bindings
pub mod locate;       // work/personal classification, context paths
pub mod merger;       // pure previous + proposed -> merged
pub mod reviewer;     // review gate
pub mod state;        // the ONLY SQLite user
pub mod sync;         // remote collaborator

// Public API
pub use coordinator::{Admission, Candidate, CommitResult, Coordinator, SyncStatus};
pub use hierarchy::{ClassificationPrompt, FixedAnswer, HierarchyResolver, MonorepoBinding, Resolution, Target};
pub use locate::{Classification, PathClassifier, ProjectLocation};
pub use merger::{merge, merge_text, merge_with_report, MergePolicy, MergeReport};
pub use reviewer::{review, Issue, IssueKind, Review, ReviewPolicy, Verdict};
pub use state::StateStore;
pub use sync::{GitSync, NoopSync, RemoteSync};

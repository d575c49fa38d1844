pub mod exclusion;
pub mod file_walker;
pub mod identity;
pub mod registry;
pub mod search;

pub use exclusion::{DirSignature, ExclusionPolicy, MarkerSignature};
pub use file_walker::{FailureKind, PermissionFailures, RootError, WalkOutcome, Walker};
pub use identity::{DirIdentity, IdentityTracker};
pub use registry::{FileRecord, FileRegistry};
pub use search::{LineSearcher, RegexSearcher, SearchError, SearchRequest};

//! changemark-io: filesystem side of changemark.
//!
//! Finds before/after pairs (by naming convention or explicit
//! manifest), loads them, feeds each through `changemark-pipeline`, and
//! writes the annotated result plus a copy of the "before" image.
//! Pairs run in parallel and fail independently; see [`batch`].
//!
//! All progress and skip messages go through the `log` facade. The
//! binary decides where they end up.

pub mod batch;
pub mod error;
pub mod load;
pub mod manifest;
pub mod naming;
pub mod output;
pub mod report;

pub use batch::{BatchConfig, BatchResult, BatchSummary, PairOutcome, PairingSource, run_batch};
pub use error::{BatchError, ManifestError, PairError, SkipKind};
pub use naming::{DiscoveredPair, ImagePair, NamingConvention, discover_pairs};
pub use report::RunReport;

/// JSON annotation input.
pub mod annotations;
/// Specification discovery and loading.
pub mod directory;
/// Per-section requirement snapshots.
pub mod snapshot;

pub use annotations::{load_annotations, parse_annotations, AnnotationLoadError, AnnotationRecord};
pub use directory::{collect_spec_paths, load_specifications, LoadError, Skipped, SpecLoad};
pub use snapshot::{load_snapshots, write_snapshots, Snapshot, SnapshotError, SnapshotLoad};

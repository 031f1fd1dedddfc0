//! IO modules - capability interfaces to external collaborators
//!
//! The camera, detection model, renderer and configuration storage are
//! external to the core; the pipeline consumes them through these traits:
//! - `source` - frame acquisition (replay directory, synthetic stub)
//! - `detector` - object detection provider (null, scripted)
//! - `annotate` - annotated-frame production seam
//! - `store` - boundary line storage (in-memory impl)

pub mod annotate;
pub mod detector;
pub mod source;
pub mod store;

// Re-export commonly used types
pub use annotate::{FrameAnnotator, PassthroughAnnotator};
pub use detector::{DetectionProvider, NullProvider, ScriptedProvider};
pub use source::{FrameHandle, FrameSource, ReplaySource, SyntheticSource};
pub use store::{BoundaryStore, MemoryStore};

pub mod error;
pub mod model;

pub use error::AppError;
pub use model::{Artifact, ArtifactKind, Discovery, FormatChoice, JobPhase, JobRequest};

// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    FaceAnalysis, FaceRegion, TargetComparison, TargetFailure, TargetVerification, Verification,
};
pub use requests::{AnalyzeFaceForm, DriveListRequest, SearchFacesForm};
pub use responses::{ErrorResponse, HealthResponse};

pub mod auth;
pub mod repositories;
pub mod submission_gateway;
pub mod upload_gateway;

pub use auth::{AuthTokenSource, NoAuth};
pub use repositories::{
    CacheRepository, FailureTransition, LocalFileRepository, ResponseRepository,
    SyncQueueRepository,
};
pub use submission_gateway::{
    BatchSubmissionResult, SubmissionAnswer, SubmissionGateway, SubmissionItem,
    SubmissionItemResult, SubmissionStatus,
};
pub use upload_gateway::{UploadGateway, UploadSource, UploadTicket, UploadTicketRequest};

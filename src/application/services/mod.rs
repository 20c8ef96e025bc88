pub mod cache_service;
pub mod file_service;
pub mod response_service;
pub mod retry_scheduler;
pub mod sync_queue_service;
pub mod upload_service;

pub use cache_service::CacheService;
pub use file_service::FileService;
pub use response_service::ResponseService;
pub use retry_scheduler::{MaintenanceReport, RetryScheduler, SchedulerSettings, SyncRunReport};
pub use sync_queue_service::{SyncQueueService, compute_failure_transition};
pub use upload_service::UploadService;

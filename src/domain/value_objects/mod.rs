pub mod answer_map;
pub mod cache_key;
pub mod capture_context;
pub mod file_status;
pub mod local_file_id;
pub mod operation_type;
pub mod payload;
pub mod response_id;
pub mod response_status;
pub mod sync_queue_id;
pub mod sync_queue_status;

pub use answer_map::AnswerMap;
pub use cache_key::CacheKey;
pub use capture_context::{DeviceInfo, GeoLocation};
pub use file_status::{FileKind, FileSyncStatus};
pub use local_file_id::LocalFileId;
pub use operation_type::{EntityType, SyncOperationType};
pub use payload::QueuePayload;
pub use response_id::ResponseId;
pub use response_status::{ResponseStatus, ResponseSyncStatus, ReviewOutcome};
pub use sync_queue_id::SyncQueueId;
pub use sync_queue_status::SyncQueueStatus;

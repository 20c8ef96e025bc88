pub mod cache_entry;
pub mod local_file;
pub mod survey_response;
pub mod sync_queue_item;

pub use cache_entry::CacheEntry;
pub use local_file::{FileContent, LocalFile, NewLocalFile, RemoteObject, extension_for_mime};
pub use survey_response::{NewSurveyResponse, SurveyResponse};
pub use sync_queue_item::{
    QueueSummary, SUBMIT_RESPONSE_PRIORITY, SyncQueueItem, SyncQueueItemDraft,
    UPLOAD_FILE_PRIORITY,
};

pub mod entities;
pub mod value_objects;

pub use entities::{
    CacheEntry, FileContent, LocalFile, NewLocalFile, NewSurveyResponse, RemoteObject,
    SurveyResponse, SyncQueueItem, SyncQueueItemDraft,
};
pub use value_objects::{
    AnswerMap, CacheKey, LocalFileId, ResponseId, ResponseStatus, ResponseSyncStatus,
    SyncQueueId, SyncQueueStatus,
};

pub(super) const INSERT_RESPONSE: &str = r#"
    INSERT INTO responses (
        id,
        survey_id,
        survey_version,
        user_id,
        assignment_id,
        status,
        answers,
        device_info,
        location,
        started_at,
        completed_at,
        duration_seconds,
        sync_status,
        sync_attempts,
        last_sync_error,
        last_synced_at,
        remote_response_id,
        immutable,
        content_hash,
        created_at,
        updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)
"#;

pub(super) const UPDATE_RESPONSE_ANSWERS: &str = r#"
    UPDATE responses
    SET answers = ?2,
        updated_at = ?3
    WHERE id = ?1
      AND immutable = 0
      AND status IN ('draft', 'completed')
      AND sync_status NOT IN ('syncing', 'synced')
"#;

pub(super) const COMPLETE_RESPONSE: &str = r#"
    UPDATE responses
    SET status = 'completed',
        completed_at = ?2,
        duration_seconds = ?3,
        updated_at = ?2
    WHERE id = ?1
      AND status = 'draft'
"#;

pub(super) const SELECT_RESPONSE_BY_ID: &str = r#"
    SELECT * FROM responses
    WHERE id = ?1
"#;

pub(super) const SELECT_RESPONSES_BY_USER: &str = r#"
    SELECT * FROM responses
    WHERE user_id = ?1
    ORDER BY started_at DESC
    LIMIT ?2
"#;

pub(super) const SELECT_PENDING_SYNC_RESPONSES: &str = r#"
    SELECT * FROM responses
    WHERE status = 'completed'
      AND sync_status IN ('pending', 'error')
    ORDER BY completed_at ASC
"#;

pub(super) const MARK_RESPONSE_SYNCING: &str = r#"
    UPDATE responses
    SET sync_status = 'syncing',
        updated_at = ?2
    WHERE id = ?1
      AND sync_status != 'synced'
"#;

pub(super) const MARK_RESPONSE_SYNCED: &str = r#"
    UPDATE responses
    SET sync_status = 'synced',
        last_synced_at = ?2,
        remote_response_id = COALESCE(?3, remote_response_id),
        last_sync_error = NULL,
        updated_at = ?2
    WHERE id = ?1
      AND status = 'completed'
"#;

pub(super) const MARK_RESPONSE_SYNC_ERROR: &str = r#"
    UPDATE responses
    SET sync_status = 'error',
        sync_attempts = sync_attempts + 1,
        last_sync_error = ?2,
        updated_at = ?3
    WHERE id = ?1
      AND sync_status != 'synced'
"#;

pub(super) const APPLY_RESPONSE_REVIEW: &str = r#"
    UPDATE responses
    SET status = ?2,
        content_hash = COALESCE(?3, content_hash),
        immutable = ?4,
        updated_at = ?5
    WHERE id = ?1
"#;

pub(super) const SELECT_FILE_CONTENT_FOR_RESPONSE: &str = r#"
    SELECT local_path, inline_data
    FROM local_files
    WHERE response_id = ?1
"#;

pub(super) const DELETE_QUEUE_ITEMS_FOR_RESPONSE: &str = r#"
    DELETE FROM sync_queue
    WHERE (entity_type = 'response' AND entity_id = ?1)
       OR (entity_type = 'local_file'
           AND entity_id IN (SELECT id FROM local_files WHERE response_id = ?1))
"#;

pub(super) const DELETE_DRAFT_RESPONSE: &str = r#"
    DELETE FROM responses
    WHERE id = ?1
      AND status = 'draft'
      AND sync_status != 'synced'
"#;

pub(super) const RESET_SYNCING_RESPONSES: &str = r#"
    UPDATE responses
    SET sync_status = 'pending',
        updated_at = ?1
    WHERE sync_status = 'syncing'
"#;

pub(super) const INSERT_LOCAL_FILE: &str = r#"
    INSERT INTO local_files (
        id,
        response_id,
        question_id,
        kind,
        local_path,
        inline_data,
        file_name,
        mime_type,
        size_bytes,
        sync_status,
        upload_attempts,
        last_error,
        remote_object_id,
        remote_version,
        remote_url,
        extraction,
        uploaded_at,
        local_purged_at,
        created_at,
        updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)
"#;

pub(super) const SELECT_LOCAL_FILE_BY_ID: &str = r#"
    SELECT * FROM local_files
    WHERE id = ?1
"#;

pub(super) const SELECT_LOCAL_FILES_BY_RESPONSE: &str = r#"
    SELECT * FROM local_files
    WHERE response_id = ?1
    ORDER BY created_at ASC
"#;

pub(super) const SELECT_UPLOADABLE_FILES: &str = r#"
    SELECT * FROM local_files
    WHERE sync_status IN ('pending', 'error')
      AND (local_path IS NOT NULL OR inline_data IS NOT NULL)
    ORDER BY created_at ASC
    LIMIT ?1
"#;

pub(super) const COUNT_RESPONSE_ACCEPTING_FILES: &str = r#"
    SELECT COUNT(*) FROM responses
    WHERE id = ?1
      AND immutable = 0
      AND status IN ('draft', 'completed')
      AND sync_status NOT IN ('syncing', 'synced')
"#;

pub(super) const MARK_FILE_UPLOADING: &str = r#"
    UPDATE local_files
    SET sync_status = 'uploading',
        upload_attempts = upload_attempts + 1,
        updated_at = ?2
    WHERE id = ?1
      AND sync_status != 'uploaded'
"#;

pub(super) const MARK_FILE_UPLOADED: &str = r#"
    UPDATE local_files
    SET sync_status = 'uploaded',
        remote_object_id = ?2,
        remote_version = ?3,
        remote_url = ?4,
        uploaded_at = ?5,
        last_error = NULL,
        updated_at = ?5
    WHERE id = ?1
"#;

pub(super) const MARK_FILE_UPLOAD_ERROR: &str = r#"
    UPDATE local_files
    SET sync_status = 'error',
        last_error = ?2,
        updated_at = ?3
    WHERE id = ?1
      AND sync_status != 'uploaded'
"#;

pub(super) const ATTACH_FILE_EXTRACTION: &str = r#"
    UPDATE local_files
    SET extraction = ?2,
        updated_at = ?3
    WHERE id = ?1
"#;

pub(super) const SELECT_PURGEABLE_FILES: &str = r#"
    SELECT * FROM local_files
    WHERE sync_status = 'uploaded'
      AND uploaded_at <= ?1
      AND (local_path IS NOT NULL OR inline_data IS NOT NULL)
    ORDER BY uploaded_at ASC
"#;

pub(super) const MARK_FILE_CONTENT_PURGED: &str = r#"
    UPDATE local_files
    SET local_path = NULL,
        inline_data = NULL,
        local_purged_at = ?2,
        updated_at = ?2
    WHERE id = ?1
      AND sync_status = 'uploaded'
"#;

pub(super) const RESET_UPLOADING_FILES: &str = r#"
    UPDATE local_files
    SET sync_status = 'pending',
        updated_at = ?1
    WHERE sync_status = 'uploading'
"#;

pub(super) const INSERT_SYNC_QUEUE_ITEM: &str = r#"
    INSERT INTO sync_queue (
        operation_type,
        entity_type,
        entity_id,
        payload,
        status,
        priority,
        retry_count,
        max_retries,
        next_retry_at,
        created_at,
        updated_at
    ) VALUES (?1, ?2, ?3, ?4, 'pending', ?5, 0, ?6, NULL, ?7, ?7)
"#;

pub(super) const SELECT_SYNC_QUEUE_ITEM_BY_ID: &str = r#"
    SELECT * FROM sync_queue
    WHERE id = ?1
"#;

pub(super) const SELECT_DUE_SYNC_QUEUE_ITEMS: &str = r#"
    SELECT * FROM sync_queue
    WHERE status = 'pending'
      AND (next_retry_at IS NULL OR next_retry_at <= ?1)
    ORDER BY priority ASC, created_at ASC, id ASC
    LIMIT ?2
"#;

pub(super) const SELECT_SYNC_QUEUE_ITEMS_BY_STATUS: &str = r#"
    SELECT * FROM sync_queue
    WHERE status = ?1
    ORDER BY updated_at DESC, id DESC
    LIMIT ?2
"#;

pub(super) const CLAIM_SYNC_QUEUE_ITEM: &str = r#"
    UPDATE sync_queue
    SET status = 'processing',
        updated_at = ?2
    WHERE id = ?1
      AND status = 'pending'
"#;

pub(super) const RECORD_SYNC_QUEUE_FAILURE: &str = r#"
    UPDATE sync_queue
    SET status = ?2,
        retry_count = ?3,
        next_retry_at = ?4,
        last_error = ?5,
        updated_at = ?6
    WHERE id = ?1
"#;

pub(super) const COMPLETE_SYNC_QUEUE_ITEM: &str = r#"
    UPDATE sync_queue
    SET status = 'completed',
        completed_at = ?2,
        next_retry_at = NULL,
        last_error = NULL,
        updated_at = ?2
    WHERE id = ?1
"#;

pub(super) const DEFER_SYNC_QUEUE_ITEM: &str = r#"
    UPDATE sync_queue
    SET status = 'pending',
        next_retry_at = ?2,
        last_error = ?3,
        updated_at = ?4
    WHERE id = ?1
      AND status IN ('pending', 'processing')
"#;

pub(super) const RETRY_FAILED_SYNC_QUEUE_ITEMS: &str = r#"
    UPDATE sync_queue
    SET status = 'pending',
        retry_count = 0,
        next_retry_at = NULL,
        updated_at = ?1
    WHERE status = 'failed'
"#;

pub(super) const CLEANUP_COMPLETED_SYNC_QUEUE_ITEMS: &str = r#"
    DELETE FROM sync_queue
    WHERE status = 'completed'
      AND completed_at < ?1
"#;

pub(super) const RECOVER_PROCESSING_SYNC_QUEUE_ITEMS: &str = r#"
    UPDATE sync_queue
    SET status = 'pending',
        updated_at = ?1
    WHERE status = 'processing'
"#;

pub(super) const COUNT_SYNC_QUEUE_BY_STATUS: &str = r#"
    SELECT status, COUNT(*) AS count
    FROM sync_queue
    GROUP BY status
"#;

pub(super) const SELECT_CACHE_ENTRY: &str = r#"
    SELECT key, value, expires_at, created_at, updated_at
    FROM kv_cache
    WHERE key = ?1
"#;

pub(super) const DELETE_EXPIRED_CACHE_ENTRY: &str = r#"
    DELETE FROM kv_cache
    WHERE key = ?1
      AND expires_at IS NOT NULL
      AND expires_at <= ?2
"#;

pub(super) const UPSERT_CACHE_ENTRY: &str = r#"
    INSERT INTO kv_cache (key, value, expires_at, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?4, ?4)
    ON CONFLICT(key) DO UPDATE SET
        value = excluded.value,
        expires_at = excluded.expires_at,
        updated_at = excluded.updated_at
"#;

pub(super) const DELETE_CACHE_ENTRY: &str = r#"
    DELETE FROM kv_cache
    WHERE key = ?1
"#;

pub(super) const CLEAR_CACHE: &str = r#"
    DELETE FROM kv_cache
"#;

pub(super) const DELETE_EXPIRED_CACHE_ENTRIES: &str = r#"
    DELETE FROM kv_cache
    WHERE expires_at IS NOT NULL
      AND expires_at <= ?1
"#;

use crate::domain::entities::{FileContent, extension_for_mime};
use crate::shared::error::AppError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// 転送可能な実ファイル。`temporary` のものは転送後に削除する
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedFile {
    pub path: PathBuf,
    pub temporary: bool,
}

/// キャプチャしたメディアのローカルバイト列を扱う
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: data_dir.into(),
        }
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    pub async fn size_of(&self, content: &FileContent) -> Result<u64, AppError> {
        match content {
            FileContent::Path { path } => {
                let metadata = tokio::fs::metadata(path).await.map_err(|e| {
                    AppError::Storage(format!("Cannot read {}: {e}", path.display()))
                })?;
                if !metadata.is_file() {
                    return Err(AppError::InvalidInput(format!(
                        "{} is not a regular file",
                        path.display()
                    )));
                }
                Ok(metadata.len())
            }
            FileContent::Inline { data } => Ok(decode_inline(data)?.len() as u64),
        }
    }

    /// Paths are used as-is; inline data is written under `tmp/`.
    pub async fn materialize(
        &self,
        content: &FileContent,
        mime_type: &str,
    ) -> Result<MaterializedFile, AppError> {
        match content {
            FileContent::Path { path } => Ok(MaterializedFile {
                path: path.clone(),
                temporary: false,
            }),
            FileContent::Inline { data } => {
                let bytes = decode_inline(data)?;
                let dir = self.temp_dir();
                tokio::fs::create_dir_all(&dir).await?;

                let path = dir.join(format!(
                    "{}.{}",
                    Uuid::new_v4(),
                    extension_for_mime(mime_type)
                ));
                tokio::fs::write(&path, bytes).await?;
                Ok(MaterializedFile {
                    path,
                    temporary: true,
                })
            }
        }
    }

    pub async fn release(&self, file: &MaterializedFile) {
        if !file.temporary {
            return;
        }
        if let Err(err) = remove_if_exists(&file.path).await {
            tracing::warn!(path = %file.path.display(), error = %err, "failed to remove temp file");
        }
    }

    /// Inline content has no bytes on disk, so only paths are touched.
    pub async fn remove_content(&self, content: &FileContent) -> Result<(), AppError> {
        match content {
            FileContent::Path { path } => remove_if_exists(path).await,
            FileContent::Inline { .. } => Ok(()),
        }
    }
}

fn decode_inline(data: &str) -> Result<Vec<u8>, AppError> {
    let payload = FileContent::inline_payload(data.trim());
    Ok(BASE64_STANDARD.decode(payload)?)
}

async fn remove_if_exists(path: &Path) -> Result<(), AppError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(AppError::Storage(format!(
            "Failed to remove {}: {err}",
            path.display()
        ))),
    }
}

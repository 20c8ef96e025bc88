use async_trait::async_trait;

/// 認証トークンの取得元。取得・更新ロジックは外部で持つ
#[async_trait]
pub trait AuthTokenSource: Send + Sync {
    async fn access_token(&self) -> Option<String>;
}

pub struct NoAuth;

#[async_trait]
impl AuthTokenSource for NoAuth {
    async fn access_token(&self) -> Option<String> {
        None
    }
}

use crate::{context::Context, error::HttpError};

/// Hooks run around every routed handler, in registration order.
///
/// `Err` short-circuits the request and becomes the error response.
#[async_trait::async_trait]
pub trait Middleware<C>: Send + Sync
where
    C: Send + Sync + 'static,
{
    /// リクエスト受信後、ハンドラ実行前の処理（例: 認証、ロギング等）
    #[allow(unused_variables)]
    async fn before(&self, ctx: &mut Context<C>) -> Result<(), HttpError> {
        Ok(())
    }

    /// ハンドラ実行後、レスポンス返却前の処理（例: レスポンスヘッダー追加等）
    #[allow(unused_variables)]
    async fn after(&self, ctx: &mut Context<C>) -> Result<(), HttpError> {
        Ok(())
    }
}

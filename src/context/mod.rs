use std::{any::Any, sync::Arc};

use crate::{
    error::HttpError,
    request::Req,
    response::Res,
    router::{Handler, Route},
    service::ServiceLocator,
};

/// アプリケーション共有コンテキストの既定値
#[derive(Clone, Debug, Default)]
pub struct DefaultContext {}

impl DefaultContext {
    pub fn new() -> DefaultContext {
        DefaultContext {}
    }
}

/// Request-scoped state handed to middleware and handlers.
///
/// `route` is the clone returned by the route map for this request, and
/// `services` a scoped copy of the application's service locator.
pub struct Context<C> {
    pub req: Req,
    pub res: Res,
    pub route: Route<Handler<C>>,
    pub services: ServiceLocator,
    pub c: Box<C>,
}

impl<C> Context<C> {
    /// ルートパラメータを取得する
    #[inline]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.route.param(name)
    }

    /// 必須のルートパラメータ。無ければ 400
    pub fn require_param(&self, name: &str) -> Result<&str, HttpError> {
        self.param(name)
            .ok_or_else(|| HttpError::BadRequest(format!("missing parameter {}", name)))
    }

    /// サービスを解決する。解決できなければ 500
    #[inline]
    pub fn service<T: Any + Send + Sync>(&self) -> Result<Arc<T>, HttpError> {
        Ok(self.services.resolve::<T>()?)
    }

    /// ルート設定を取得する
    #[inline]
    pub fn setting<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.route.settings().get::<T>(key)
    }
}

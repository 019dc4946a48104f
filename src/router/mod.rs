//! Pattern router (Rule + Route + RouteMap)
//!
//! パターンルータ。ルール一つにつき正規表現一つ。

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::{context::Context, error::HttpError};

pub mod map;
pub mod route;
pub mod rule;

pub use map::{RouteMap, WILDCARD};
pub use route::{Route, Settings};
pub use rule::{CompiledRule, Constraint, Params, Rule, RuleProperty};

/// Boxed async handler type for routing.
///
/// This type represents an async handler function that takes a context and returns a future.
///
/// ルーティング用のBox化された非同期ハンドラ型。
/// この型は、コンテキストを受け取り、Futureを返す非同期ハンドラ関数を表します。
pub type BoxedHandler<C> =
    Box<dyn Fn(Context<C>) -> BoxFuture<'static, Result<Context<C>, HttpError>> + Send + Sync>;

/// アプリケーションが登録するルートの callback 型
pub type Handler<C> = Arc<BoxedHandler<C>>;

/// Outcome of a method-scoped lookup.
///
/// メソッド指定の検索と全体検索の二段階で 404 と 405 を区別する。
#[derive(Debug)]
pub enum Resolution<H> {
    Found(Route<H>),
    MethodNotAllowed,
    NotFound,
}

/// Looks `path` up under `group`; on a miss, repeats the lookup under
/// [`WILDCARD`] to tell "no such path" from "path exists for another group".
pub fn resolve<H: Clone>(
    map: &RouteMap<H>,
    path: &str,
    group: &str,
) -> Result<Resolution<H>, crate::error::RoutingError> {
    if let Some(route) = map.find(path, [group])? {
        return Ok(Resolution::Found(route));
    }
    if map.find(path, [WILDCARD])?.is_some() {
        return Ok(Resolution::MethodNotAllowed);
    }
    Ok(Resolution::NotFound)
}

use std::{any::Any, future::Future, sync::Arc, time::Instant};

use futures::FutureExt;
use log::{debug, error, info, warn};

use crate::{
    config::AppConfig,
    context::{Context, DefaultContext},
    error::{BoltError, HttpError, RoutingError, ServiceError},
    middleware::Middleware,
    request::Req,
    response::Res,
    router::{resolve, BoxedHandler, Handler, Resolution, Route, RouteMap, Settings},
    service::{Dependency, ServiceLocator},
    utils::method::Method,
    validation::{Validator, VALIDATOR},
};

/// A registered, not yet mapped endpoint.
///
/// 登録時に返されるビルダ。`ready()` でルートマップに載る。
pub struct Endpoint<C> {
    rule: String,
    methods: Vec<Method>,
    handler: Handler<C>,
    settings: Settings,
    requires: Vec<Dependency>,
}

impl<C> Endpoint<C> {
    /// ルート設定を追加する（例: バリデータ）
    pub fn setting<T: Any + Send + Sync>(&mut self, key: &str, value: T) -> &mut Self {
        self.settings.insert(key, value);
        self
    }

    /// `ValidationService` が参照するバリデータを設定する
    pub fn validator<V: Validator + 'static>(&mut self, validator: V) -> &mut Self {
        let validator: Arc<dyn Validator> = Arc::new(validator);
        self.settings.insert(VALIDATOR, validator);
        self
    }

    /// ハンドラが必要とするサービスを宣言する
    pub fn requires<T: Any + Send + Sync>(&mut self) -> &mut Self {
        self.requires.push(Dependency::of::<T>());
        self
    }

    #[inline]
    pub fn rule(&self) -> &str {
        &self.rule
    }

    #[inline]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }
}

pub struct Bolt<C>
where
    C: Clone + Send + Sync + 'static,
{
    config: AppConfig,
    context: C,
    endpoints: Vec<Endpoint<C>>,
    map: RouteMap<Handler<C>>,
    middleware: Vec<Arc<dyn Middleware<C>>>,
    services: ServiceLocator,
    ready: bool,
}

impl Bolt<DefaultContext> {
    pub fn new() -> Bolt<DefaultContext> {
        Bolt::with_context(DefaultContext::new())
    }
}

impl<C> Bolt<C>
where
    C: Clone + Send + Sync + 'static,
{
    /// コンテキストを指定して初期化する
    pub fn with_context(context: C) -> Bolt<C> {
        Bolt::with_config(AppConfig::default(), context)
    }

    /// 設定とコンテキストを指定して初期化する
    pub fn with_config(config: AppConfig, context: C) -> Bolt<C> {
        Bolt {
            config,
            context,
            endpoints: Vec::new(),
            map: RouteMap::new(),
            middleware: Vec::new(),
            services: ServiceLocator::new(),
            ready: false,
        }
    }

    #[inline]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[inline]
    fn box_handler<F, Fut>(handler: F) -> Handler<C>
    where
        F: Fn(Context<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Context<C>, HttpError>> + Send + 'static,
    {
        let boxed_handler: BoxedHandler<C> = Box::new(move |c| handler(c).boxed());
        Arc::new(boxed_handler)
    }

    /// Connects `rule` to `methods`.
    pub fn expose<F, Fut>(&mut self, rule: &str, methods: &[Method], handler: F) -> &mut Endpoint<C>
    where
        F: Fn(Context<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Context<C>, HttpError>> + Send + 'static,
    {
        self.endpoints.push(Endpoint {
            rule: rule.to_string(),
            methods: methods.to_vec(),
            handler: Self::box_handler(handler),
            settings: Settings::new(),
            requires: Vec::new(),
        });
        let idx = self.endpoints.len() - 1;
        &mut self.endpoints[idx]
    }

    pub fn get<F, Fut>(&mut self, rule: &str, handler: F) -> &mut Endpoint<C>
    where
        F: Fn(Context<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Context<C>, HttpError>> + Send + 'static,
    {
        self.expose(rule, &[Method::GET], handler)
    }

    pub fn post<F, Fut>(&mut self, rule: &str, handler: F) -> &mut Endpoint<C>
    where
        F: Fn(Context<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Context<C>, HttpError>> + Send + 'static,
    {
        self.expose(rule, &[Method::POST], handler)
    }

    pub fn put<F, Fut>(&mut self, rule: &str, handler: F) -> &mut Endpoint<C>
    where
        F: Fn(Context<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Context<C>, HttpError>> + Send + 'static,
    {
        self.expose(rule, &[Method::PUT], handler)
    }

    pub fn patch<F, Fut>(&mut self, rule: &str, handler: F) -> &mut Endpoint<C>
    where
        F: Fn(Context<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Context<C>, HttpError>> + Send + 'static,
    {
        self.expose(rule, &[Method::PATCH], handler)
    }

    pub fn delete<F, Fut>(&mut self, rule: &str, handler: F) -> &mut Endpoint<C>
    where
        F: Fn(Context<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Context<C>, HttpError>> + Send + 'static,
    {
        self.expose(rule, &[Method::DELETE], handler)
    }

    pub fn options<F, Fut>(&mut self, rule: &str, handler: F) -> &mut Endpoint<C>
    where
        F: Fn(Context<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Context<C>, HttpError>> + Send + 'static,
    {
        self.expose(rule, &[Method::OPTIONS], handler)
    }

    pub fn head<F, Fut>(&mut self, rule: &str, handler: F) -> &mut Endpoint<C>
    where
        F: Fn(Context<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Context<C>, HttpError>> + Send + 'static,
    {
        self.expose(rule, &[Method::HEAD], handler)
    }

    /// `AppConfig::any_methods` の全メソッドに公開する
    pub fn any<F, Fut>(&mut self, rule: &str, handler: F) -> &mut Endpoint<C>
    where
        F: Fn(Context<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Context<C>, HttpError>> + Send + 'static,
    {
        let methods = self.config.any_methods.clone();
        self.expose(rule, &methods, handler)
    }

    /// Registers endpoints under a common rule prefix.
    pub fn scope(&mut self, prefix: &str) -> Scope<'_, C> {
        Scope {
            prefix: prefix.to_string(),
            app: self,
        }
    }

    /// ミドルウェアを追加する。登録順に実行される
    pub fn middleware<M>(&mut self, middleware: M) -> &mut Self
    where
        M: Middleware<C> + 'static,
    {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// 型をキーにサービスを登録する
    pub fn service<T: Any + Send + Sync>(&mut self, service: T) -> &mut Self {
        self.services.set(service);
        self
    }

    #[inline]
    pub fn services(&self) -> &ServiceLocator {
        &self.services
    }

    #[inline]
    pub fn services_mut(&mut self) -> &mut ServiceLocator {
        &mut self.services
    }

    #[inline]
    pub fn routes(&self) -> &RouteMap<Handler<C>> {
        &self.map
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Builds the route map.
    ///
    /// Every rule is compiled here so a malformed pattern stops the
    /// application before it serves anything. Declared dependencies must be
    /// registered in the service locator.
    ///
    /// ルートマップは毎回作り直す。
    pub fn ready(&mut self) -> Result<&mut Self, BoltError> {
        let mut map = RouteMap::new();
        for endpoint in &self.endpoints {
            let rule = normalize_rule(&endpoint.rule, self.config.strip_trailing_slash);
            let route = Route::with_settings(&rule, Arc::clone(&endpoint.handler), endpoint.settings.clone());
            route.rule().compile()?;

            if let Some(missing) = endpoint.requires.iter().find(|d| !self.services.provides(d)) {
                error!("route {} requires unregistered service {}", rule, missing.type_name());
                return Err(BoltError::Dependency {
                    rule,
                    source: ServiceError::Unresolved(missing.type_name().to_string()),
                });
            }

            info!(
                "route: {} [{}]",
                rule,
                endpoint.methods.iter().map(Method::to_str).collect::<Vec<_>>().join(", ")
            );
            map.add(Arc::new(route), endpoint.methods.iter().map(Method::to_str));
        }
        self.map = map;
        self.ready = true;
        Ok(self)
    }

    /// Looks a route up the way `dispatch` does, without running it.
    pub fn find(&self, method: &Method, path: &str) -> Result<Option<Route<Handler<C>>>, RoutingError> {
        self.map.find(path, [method.to_str()])
    }

    /// Routes a request and runs its handler.
    ///
    /// 404 と 405 はメソッド指定の検索と全体検索の差で判定する。
    pub async fn dispatch(&self, req: Req) -> Res {
        let started = Instant::now();
        let head_info = format!("{} {} ", req.method, req.path.get_raw_path());

        let res = match self.handle(req).await {
            Ok(res) => res,
            Err(e) => {
                debug!("{}- {}", head_info, e);
                e.err_res()
            }
        };

        debug!("time: {:?}", started.elapsed());
        // ログ出力（レスポンスコードに応じて色分け）
        if res.code >= 500 {
            error!("{}- \x1b[31m{}\x1b[0m", head_info, res.code);
        } else if res.code >= 400 {
            warn!("{}- \x1b[33m{}\x1b[0m", head_info, res.code);
        } else if res.code >= 300 {
            info!("{}- \x1b[34m{}\x1b[0m", head_info, res.code);
        } else {
            info!("{}- \x1b[32m{}\x1b[0m", head_info, res.code);
        }
        res
    }

    async fn handle(&self, mut req: Req) -> Result<Res, HttpError> {
        if !self.ready {
            return Err(HttpError::ServiceUnavailable("application is not ready".to_string()));
        }

        let path = if self.config.normalize_paths {
            req.path.normalized()
        } else {
            req.path.get_path().to_string()
        };
        let route = match resolve(&self.map, &path, req.method.to_str())? {
            Resolution::Found(route) => route,
            Resolution::MethodNotAllowed => return Err(HttpError::MethodNotAllowed),
            Resolution::NotFound => return Err(HttpError::NotFound),
        };
        req.path.set_fields(route.params());

        let handler = Arc::clone(route.callback());
        let mut context = Context {
            req,
            res: Res::new(),
            route,
            services: self.services.scoped(),
            c: Box::new(self.context.clone()),
        };

        for middleware in &self.middleware {
            middleware.before(&mut context).await?;
        }
        // ハンドラを実行
        let mut context = handler(context).await?;
        for middleware in &self.middleware {
            middleware.after(&mut context).await?;
        }
        Ok(context.res)
    }
}

impl Default for Bolt<DefaultContext> {
    fn default() -> Self {
        Bolt::new()
    }
}

/// Endpoint registration under a rule prefix.
pub struct Scope<'a, C>
where
    C: Clone + Send + Sync + 'static,
{
    app: &'a mut Bolt<C>,
    prefix: String,
}

impl<C> Scope<'_, C>
where
    C: Clone + Send + Sync + 'static,
{
    #[inline]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn expose<F, Fut>(&mut self, rule: &str, methods: &[Method], handler: F) -> &mut Endpoint<C>
    where
        F: Fn(Context<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Context<C>, HttpError>> + Send + 'static,
    {
        let rule = join_rule(&self.prefix, rule);
        self.app.expose(&rule, methods, handler)
    }

    pub fn get<F, Fut>(&mut self, rule: &str, handler: F) -> &mut Endpoint<C>
    where
        F: Fn(Context<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Context<C>, HttpError>> + Send + 'static,
    {
        self.expose(rule, &[Method::GET], handler)
    }

    pub fn post<F, Fut>(&mut self, rule: &str, handler: F) -> &mut Endpoint<C>
    where
        F: Fn(Context<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Context<C>, HttpError>> + Send + 'static,
    {
        self.expose(rule, &[Method::POST], handler)
    }

    pub fn put<F, Fut>(&mut self, rule: &str, handler: F) -> &mut Endpoint<C>
    where
        F: Fn(Context<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Context<C>, HttpError>> + Send + 'static,
    {
        self.expose(rule, &[Method::PUT], handler)
    }

    pub fn patch<F, Fut>(&mut self, rule: &str, handler: F) -> &mut Endpoint<C>
    where
        F: Fn(Context<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Context<C>, HttpError>> + Send + 'static,
    {
        self.expose(rule, &[Method::PATCH], handler)
    }

    pub fn delete<F, Fut>(&mut self, rule: &str, handler: F) -> &mut Endpoint<C>
    where
        F: Fn(Context<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Context<C>, HttpError>> + Send + 'static,
    {
        self.expose(rule, &[Method::DELETE], handler)
    }

    pub fn any<F, Fut>(&mut self, rule: &str, handler: F) -> &mut Endpoint<C>
    where
        F: Fn(Context<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Context<C>, HttpError>> + Send + 'static,
    {
        let methods = self.app.config.any_methods.clone();
        self.expose(rule, &methods, handler)
    }
}

/// プレフィックス `/` は無視する
fn join_rule(prefix: &str, rule: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return rule.to_string();
    }
    format!("{}{}", prefix, rule)
}

/// 末尾の `/` を一つだけ取り除く（ルートは除く）
fn normalize_rule(rule: &str, strip_trailing_slash: bool) -> String {
    if strip_trailing_slash && rule.len() > 1 && rule.ends_with('/') {
        return rule[..rule.len() - 1].to_string();
    }
    rule.to_string()
}

use std::{any::Any, sync::Arc};

use ahash::AHashMap as Map;

use crate::error::RoutingError;

use super::rule::{Params, Rule};

/// Free-form per-route settings, readable by middleware and handlers.
///
/// ルートに付随する任意の値（バリデータなど）を保持する。
#[derive(Clone, Default)]
pub struct Settings {
    entries: Map<String, Arc<dyn Any + Send + Sync>>,
}

impl Settings {
    #[inline]
    pub fn new() -> Settings {
        Settings::default()
    }

    #[inline]
    pub fn insert<T: Any + Send + Sync>(&mut self, key: &str, value: T) -> &mut Self {
        self.entries.insert(key.to_string(), Arc::new(value));
        self
    }

    #[inline]
    pub fn insert_shared(&mut self, key: &str, value: Arc<dyn Any + Send + Sync>) -> &mut Self {
        self.entries.insert(key.to_string(), value);
        self
    }

    /// 型が一致しない場合は None
    #[inline]
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.entries.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

/// One exposed endpoint: a rule, an opaque callback and per-route settings.
///
/// `params` holds the bindings of the most recent match on *this* instance.
/// Clones share the compiled rule but own their bindings, so a clone handed
/// to a request never observes another request's match.
///
/// 公開されるエンドポイント。`RouteMap` はリクエストごとにクローンを返す。
#[derive(Clone)]
pub struct Route<H> {
    name: String,
    callback: H,
    params: Params,
    settings: Settings,
    rule: Arc<Rule>,
}

impl<H> Route<H> {
    #[inline]
    pub fn new(pattern: &str, callback: H) -> Route<H> {
        Route::with_settings(pattern, callback, Settings::new())
    }

    #[inline]
    pub fn with_settings(pattern: &str, callback: H, settings: Settings) -> Route<H> {
        Route {
            name: pattern.to_string(),
            callback,
            params: Params::new(),
            settings,
            rule: Arc::new(Rule::new(pattern)),
        }
    }

    /// ルールの文字列。ルートの同一性にも使われる
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn callback(&self) -> &H {
        &self.callback
    }

    #[inline]
    pub fn params(&self) -> &Params {
        &self.params
    }

    #[inline]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    #[inline]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[inline]
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    /// Tests `path` against the rule and records the bindings.
    ///
    /// 一致しなかった場合 params は空になる。
    pub fn match_path(&mut self, path: &str) -> Result<bool, RoutingError> {
        match self.rule.matches(path)? {
            Some(params) => {
                self.params = params;
                Ok(true)
            }
            None => {
                self.params.clear();
                Ok(false)
            }
        }
    }
}

impl<H: Clone> Route<H> {
    /// ルールを共有したまま、指定のバインディングを持つクローンを作る
    #[inline]
    pub(crate) fn bound(&self, params: Params) -> Route<H> {
        Route {
            name: self.name.clone(),
            callback: self.callback.clone(),
            params,
            settings: self.settings.clone(),
            rule: Arc::clone(&self.rule),
        }
    }
}

impl<H> PartialEq for Route<H> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<H> std::fmt::Debug for Route<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

use serde::{Deserialize, Serialize};

use crate::utils::method::Method;

/// アプリケーション設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `any()` で登録したルートが公開されるメソッド
    pub any_methods: Vec<Method>,
    /// ルーティング前にリクエストパスを正規化する
    pub normalize_paths: bool,
    /// 登録するルールの末尾 `/` を取り除く
    pub strip_trailing_slash: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            any_methods: Method::ANY.to_vec(),
            normalize_paths: true,
            strip_trailing_slash: true,
        }
    }
}

impl AppConfig {
    #[inline]
    pub fn new() -> AppConfig {
        AppConfig::default()
    }

    pub fn from_json(json: &str) -> Result<AppConfig, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn any_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.any_methods = methods.into_iter().collect();
        self
    }

    pub fn normalize_paths(mut self, enabled: bool) -> Self {
        self.normalize_paths = enabled;
        self
    }

    pub fn strip_trailing_slash(mut self, enabled: bool) -> Self {
        self.strip_trailing_slash = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AppConfig::new();
        assert_eq!(config.any_methods.len(), 6);
        assert!(config.normalize_paths);
        assert!(config.strip_trailing_slash);
    }

    #[test]
    fn partial_json() {
        let config = AppConfig::from_json(r#"{"any_methods": ["GET", "HEAD"], "normalize_paths": false}"#).unwrap();
        assert_eq!(config.any_methods, [Method::GET, Method::HEAD]);
        assert!(!config.normalize_paths);
        assert!(config.strip_trailing_slash);

        assert!(AppConfig::from_json(r#"{"normalize_paths": "yes"}"#).is_err());
    }
}

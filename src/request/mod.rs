use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::{error::HttpError, utils::{header::Header, method::Method}};

pub mod path;

pub use path::Path;

/// トランスポートから切り離されたリクエスト
pub struct Req {
    pub method: Method,
    pub path: Path,
    pub header: Header,
    pub body: Bytes,
}

impl Req {
    #[inline]
    pub fn new(method: Method, target: &str) -> Req {
        Req {
            method,
            path: Path::new(target),
            header: Header::new(),
            body: Bytes::new(),
        }
    }

    #[inline]
    pub fn with_header(mut self, key: &str, value: &str) -> Req {
        self.header.append(key, value);
        self
    }

    #[inline]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Req {
        self.body = body.into();
        self
    }

    /// ボディを UTF-8 文字列として取得する
    pub fn text(&self) -> Result<&str, HttpError> {
        std::str::from_utf8(&self.body)
            .map_err(|e| HttpError::BadRequest(format!("body is not valid utf-8: {}", e)))
    }

    /// ボディを JSON としてデコードする
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| HttpError::BadRequest(format!("invalid json body: {}", e)))
    }

    /// Cookie ヘッダから値を探す
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.header
            .gets("COOKIE")
            .into_iter()
            .flat_map(|raw| raw.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.trim_matches('"'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_helpers() {
        let req = Req::new(Method::POST, "/submit").with_body(r#"{"name":"Bob","number":17}"#);
        assert_eq!(req.text().unwrap(), r#"{"name":"Bob","number":17}"#);

        let value: serde_json::Value = req.json().unwrap();
        assert_eq!(value["number"], 17);

        let broken = Req::new(Method::POST, "/submit").with_body("{");
        assert!(matches!(broken.json::<serde_json::Value>(), Err(HttpError::BadRequest(_))));

        let binary = Req::new(Method::POST, "/submit").with_body(vec![0xff, 0xfe]);
        assert!(binary.text().is_err());
    }

    #[test]
    fn cookies() {
        let req = Req::new(Method::GET, "/")
            .with_header("Cookie", "session_id=abc; theme=\"dark\"")
            .with_header("cookie", "lang=ja");
        assert_eq!(req.cookie("session_id"), Some("abc"));
        assert_eq!(req.cookie("theme"), Some("dark"));
        assert_eq!(req.cookie("lang"), Some("ja"));
        assert_eq!(req.cookie("missing"), None);
        assert_eq!(req.header.get_cookie(), Some("session_id=abc; theme=\"dark\""));
    }
}

use serde::{Deserialize, Serialize};

/// HTTPメソッドのenum
/// ルートマップではグループキーとして文字列表現が使われる
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Method {
    GET,
    POST,
    HEAD,
    PUT,
    DELETE,
    OPTIONS,
    TRACE,
    CONNECT,
    PATCH,
    /// 未知のメソッド。大文字に揃えて保持する
    UNKNOWN(String),
}

impl Method {
    /// `any()` で登録されるメソッドの既定値
    pub const ANY: [Method; 6] = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];

    /// 文字列からMethodを取得する
    /// 大文字小文字は区別しない
    #[inline]
    pub fn from_str(method: &str) -> Method {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "HEAD" => Method::HEAD,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "OPTIONS" => Method::OPTIONS,
            "TRACE" => Method::TRACE,
            "CONNECT" => Method::CONNECT,
            "PATCH" => Method::PATCH,
            method => Method::UNKNOWN(method.to_string()),
        }
    }

    #[inline]
    pub fn to_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::HEAD => "HEAD",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::OPTIONS => "OPTIONS",
            Method::TRACE => "TRACE",
            Method::CONNECT => "CONNECT",
            Method::PATCH => "PATCH",
            Method::UNKNOWN(method) => method,
        }
    }
}

impl std::fmt::Display for Method {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl AsRef<str> for Method {
    #[inline]
    fn as_ref(&self) -> &str {
        self.to_str()
    }
}

impl From<String> for Method {
    #[inline]
    fn from(method: String) -> Self {
        Method::from_str(&method)
    }
}

impl From<Method> for String {
    #[inline]
    fn from(method: Method) -> Self {
        method.to_str().to_string()
    }
}

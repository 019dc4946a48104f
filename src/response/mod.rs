use serde::Serialize;

use crate::error::HttpError;
use crate::utils::{header::Header, status};

pub struct Res {
    /// ステータスコード
    pub code: u16,
    /// ヘッダ
    pub header: Header,
    /// ボディ
    pub body: Body,
}

/// レスポンス構築するやつ
impl Res {
    /// テキストレスポンス
    #[inline]
    pub fn text(&mut self, text: &str) -> &mut Self {
        self.set_text(text, "text/plain; charset=utf-8")
    }

    /// HTMLレスポンス
    #[inline]
    pub fn html(&mut self, text: &str) -> &mut Self {
        self.set_text(text, "text/html; charset=utf-8")
    }

    /// JSONレスポンス
    #[inline]
    pub fn json(&mut self, text: &str) -> &mut Self {
        self.set_text(text, "application/json")
    }

    /// JSONレスポンス
    #[inline]
    pub fn json_value(&mut self, value: &serde_json::Value) -> &mut Self {
        self.set_text(&value.to_string(), "application/json")
    }

    /// シリアライズ可能な値を JSON で返す
    pub fn serialize<T: Serialize>(&mut self, value: &T) -> Result<&mut Self, HttpError> {
        let text = serde_json::to_string(value)
            .map_err(|e| HttpError::InternalServerError(format!("failed to serialize response: {}", e)))?;
        Ok(self.set_text(&text, "application/json"))
    }

    /// バイナリレスポンス
    #[inline]
    pub fn binary(&mut self, data: &[u8]) -> &mut Self {
        self.data(data, "application/octet-stream")
    }

    #[inline]
    pub fn data(&mut self, data: &[u8], content_type: &str) -> &mut Self {
        self.header.set("Content-Type", content_type);
        self.header.set("Content-Length", &data.len().to_string());
        self.body = Body::Binary(data.to_vec());
        self
    }

    #[inline]
    fn set_text(&mut self, text: &str, content_type: &str) -> &mut Self {
        self.header.set("Content-Type", content_type);
        self.header.set("Content-Length", &text.len().to_string());
        self.body = Body::Text(text.to_string());
        self
    }
}

impl Res {
    #[inline]
    pub fn new() -> Res {
        Res {
            code: status::status_code::OK,
            header: Header::new(),
            body: Body::Empty,
        }
    }

    /// ステータスコードをセットする
    #[inline]
    pub fn set_status(&mut self, code: u16) -> &mut Self {
        self.code = code;
        self
    }

    #[inline]
    pub fn set_header(&mut self, key: &str, value: &str) -> &mut Self {
        self.header.set(key, value);
        self
    }

    /// Set-Cookie は複数行になり得るので追加のみ
    #[inline]
    pub fn set_cookie(&mut self, key: &str, value: &str) -> &mut Self {
        self.header.append("Set-Cookie", &format!("{}={}", key, value));
        self
    }

    /// 例: `200 OK`
    #[inline]
    pub fn status_line(&self) -> String {
        status::status_line(self.code)
    }

    pub fn body_bytes(&self) -> &[u8] {
        match &self.body {
            Body::Empty => &[],
            Body::Text(text) => text.as_bytes(),
            Body::Binary(data) => data,
        }
    }
}

impl Default for Res {
    fn default() -> Self {
        Res::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Empty,
    Text(String),
    Binary(Vec<u8>),
}

/// HTTPのヘッダ
/// キーは大文字小文字を区別しない（`-` と `_` も同一視する）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    /// ヘッダのキーと値のペア
    /// リニアサーチの方が早い
    pub headers: Vec<(String, String)>,
}

#[inline]
fn same_key(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a.bytes().zip(b.bytes()).all(|(x, y)| {
            let x = if x == b'_' { b'-' } else { x };
            let y = if y == b'_' { b'-' } else { y };
            x.eq_ignore_ascii_case(&y)
        })
}

impl Header {
    pub fn new() -> Header {
        Header {
            headers: Vec::new(),
        }
    }

    /// 追加する。同名のヘッダがあっても置き換えない
    pub fn append(&mut self, key: &str, value: &str) {
        self.headers.push((key.to_string(), value.to_string()));
    }

    /// 同名のヘッダを置き換える
    pub fn set(&mut self, key: &str, value: &str) {
        self.del(key);
        self.append(key, value);
    }

    pub fn del(&mut self, key: &str) {
        self.headers.retain(|(k, _)| !same_key(k, key));
    }

    /// ヘッダを取得する
    /// 任意のキーに対応するヘッダを線形探索します
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers.iter().find(|(k, _)| same_key(k, key)).map(|(_, v)| v.as_str())
    }

    pub fn gets(&self, key: &str) -> Vec<&str> {
        self.headers.iter().filter(|(k, _)| same_key(k, key)).map(|(_, v)| v.as_str()).collect()
    }

    pub fn index(&self, key: &str) -> Option<usize> {
        self.headers.iter().position(|(k, _)| same_key(k, key))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// head: get_cookie を取得する
    pub fn get_cookie(&self) -> Option<&str> {
        self.get("COOKIE")
    }

    /// head: get_content_length を取得する
    pub fn get_content_length(&self) -> Option<&str> {
        self.get("CONTENT-LENGTH")
    }

    /// head: get_content_type を取得する
    pub fn get_content_type(&self) -> Option<&str> {
        self.get("CONTENT-TYPE")
    }
}

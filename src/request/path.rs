use crate::router::Params;

/// リクエストターゲット
pub struct Path {
    /// パスの文字列(完全)を保持
    pub path: String,
    query: Option<Vec<(String, String)>>,
    fields: Params,
}

impl Path {
    #[inline]
    pub fn new(path: &str) -> Path {
        Path {
            path: path.to_string(),
            query: None,
            fields: Params::new(),
        }
    }

    /// 生の全体パスを取得する
    /// 例: "/api/v1/user?id=123&name=John"
    #[inline]
    pub fn get_raw_path(&self) -> &str {
        &self.path
    }

    /// クエリとフラグメントを除いたパス
    #[inline]
    pub fn get_path(&self) -> &str {
        let end = self.path.find(|c: char| c == '?' || c == '#').unwrap_or(self.path.len());
        &self.path[..end]
    }

    /// ルータに渡せる形に正規化したパス
    /// 先頭の `/` を補い、末尾の `/` と連続する `/` を取り除く
    pub fn normalized(&self) -> String {
        let mut normalized = String::with_capacity(self.path.len() + 1);
        for segment in self.get_path().split('/').filter(|s| !s.is_empty()) {
            normalized.push('/');
            normalized.push_str(segment);
        }
        if normalized.is_empty() {
            normalized.push('/');
        }
        normalized
    }

    /// クエリパラメータを取得する
    #[inline]
    pub fn get_query(&mut self, key: &str) -> Option<String> {
        if self.query.is_none() {
            self.query = Some(Self::dec_query(&self.path));
        }
        self.query
            .as_ref()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// クエリパラメータのデコード
    fn dec_query(path: &str) -> Vec<(String, String)> {
        let query = path.split_once('?').map(|(_, q)| q).unwrap_or("");
        let query = query.split('#').next().unwrap_or("");
        query
            .split('&')
            .filter(|s| !s.is_empty())
            .map(|s| match s.split_once('=') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (s.to_string(), String::new()),
            })
            .collect()
    }

    /// フィールドを取得する
    /// ルートのパラメータ名を使用
    #[inline]
    pub fn get_field(&self, key: &str) -> Option<String> {
        self.fields.get(key).map(str::to_string)
    }

    #[inline]
    pub fn fields(&self) -> &Params {
        &self.fields
    }

    /// フィールドをセットする
    /// Routerのお仕事です
    #[inline]
    pub fn set_field(&mut self, key: &str, value: &str) {
        self.fields.insert(key, value);
    }

    #[inline]
    pub fn set_fields(&mut self, params: &Params) {
        for (key, value) in params.iter() {
            self.fields.insert(key, value);
        }
    }
}

use regex::Regex;
use serde_json::Value;

/// 一つのフィールドに対する検証ルール
///
/// `value` はフィールドが無いか null のとき `None`。失敗時は理由を返す。
pub trait FieldRule: Send + Sync {
    fn check(&self, value: Option<&Value>) -> Result<(), String>;
}

#[inline]
fn check_required(required: bool, value: Option<&Value>) -> Option<Result<(), String>> {
    match value {
        None if required => Some(Err("is required".to_string())),
        None => Some(Ok(())),
        Some(_) => None,
    }
}

/// 文字列。長さは文字数で数える
#[derive(Debug, Clone, Default)]
pub struct StringRule {
    required: bool,
    min: Option<usize>,
    max: Option<usize>,
}

impl StringRule {
    pub fn new() -> StringRule {
        StringRule::default()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min(mut self, min: usize) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }
}

impl FieldRule for StringRule {
    fn check(&self, value: Option<&Value>) -> Result<(), String> {
        if let Some(result) = check_required(self.required, value) {
            return result;
        }
        let Some(Value::String(text)) = value else {
            return Err("is not a string".to_string());
        };
        let len = text.chars().count();
        if self.min.is_some_and(|min| len < min) {
            return Err("is too short".to_string());
        }
        if self.max.is_some_and(|max| len > max) {
            return Err("is too long".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NumberRule {
    required: bool,
    min: Option<f64>,
    max: Option<f64>,
    allow_decimals: bool,
}

impl Default for NumberRule {
    fn default() -> Self {
        NumberRule {
            required: false,
            min: None,
            max: None,
            allow_decimals: true,
        }
    }
}

impl NumberRule {
    pub fn new() -> NumberRule {
        NumberRule::default()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    /// 整数のみ受け付ける
    pub fn integer(mut self) -> Self {
        self.allow_decimals = false;
        self
    }
}

impl FieldRule for NumberRule {
    fn check(&self, value: Option<&Value>) -> Result<(), String> {
        if let Some(result) = check_required(self.required, value) {
            return result;
        }
        let Some(Value::Number(number)) = value else {
            return Err("is not a valid number".to_string());
        };
        if number.is_f64() && !self.allow_decimals {
            return Err("is a decimal number, integer number expected".to_string());
        }
        let Some(n) = number.as_f64() else {
            return Err("is not a valid number".to_string());
        };
        if self.min.is_some_and(|min| n < min) {
            return Err("is too low".to_string());
        }
        if self.max.is_some_and(|max| n > max) {
            return Err("is too high".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct BooleanRule {
    required: bool,
}

impl BooleanRule {
    pub fn new() -> BooleanRule {
        BooleanRule::default()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

impl FieldRule for BooleanRule {
    fn check(&self, value: Option<&Value>) -> Result<(), String> {
        if let Some(result) = check_required(self.required, value) {
            return result;
        }
        match value {
            Some(Value::Bool(_)) => Ok(()),
            _ => Err("is not a boolean".to_string()),
        }
    }
}

/// 文字列を正規表現で検証する（例: メールアドレス）
#[derive(Debug, Clone)]
pub struct PatternRule {
    required: bool,
    regex: Regex,
}

impl PatternRule {
    /// パターン全体に一致する必要がある
    pub fn new(pattern: &str) -> Result<PatternRule, regex::Error> {
        Ok(PatternRule {
            required: false,
            regex: Regex::new(&format!("^(?:{})$", pattern))?,
        })
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

impl FieldRule for PatternRule {
    fn check(&self, value: Option<&Value>) -> Result<(), String> {
        if let Some(result) = check_required(self.required, value) {
            return result;
        }
        match value {
            Some(Value::String(text)) if self.regex.is_match(text) => Ok(()),
            _ => Err("is not valid".to_string()),
        }
    }
}

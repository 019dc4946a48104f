//! Route pattern compiler.
//!
//! ルールの書式:
//!
//! ```text
//! /user/{name}[/{id:numeric}[/nested-route]]
//! ```
//!
//! * `{name}` / `{name:constraint}` がパラメータ。`constraint` は
//!   `any` `numeric` `alpha` `alphanum` のいずれか（省略時は `any`）。
//! * `[...]` は省略可能な末尾セグメント。入れ子可。
//!
//! パターン全体で一つの正規表現にコンパイルされ、最初の `matches` 呼び出し時に
//! 一度だけ構築されてキャッシュされる。

use once_cell::sync::OnceCell;
use regex::Regex;
use smallvec::SmallVec;

use crate::error::{PathError, PatternError, RoutingError};

/// Character class a parameter is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constraint {
    Any,
    Numeric,
    Alpha,
    Alphanum,
}

impl Constraint {
    pub const ALL: [Constraint; 4] = [
        Constraint::Any,
        Constraint::Numeric,
        Constraint::Alpha,
        Constraint::Alphanum,
    ];

    #[inline]
    pub fn from_str(name: &str) -> Option<Constraint> {
        match name {
            "any" => Some(Constraint::Any),
            "numeric" => Some(Constraint::Numeric),
            "alpha" => Some(Constraint::Alpha),
            "alphanum" => Some(Constraint::Alphanum),
            _ => None,
        }
    }

    #[inline]
    pub fn to_str(&self) -> &'static str {
        match self {
            Constraint::Any => "any",
            Constraint::Numeric => "numeric",
            Constraint::Alpha => "alpha",
            Constraint::Alphanum => "alphanum",
        }
    }

    /// 正規表現の断片。大文字小文字はルール全体で無視される
    #[inline]
    pub fn regex(&self) -> &'static str {
        match self {
            Constraint::Any => "[^/]+",
            Constraint::Numeric => "[0-9]+",
            Constraint::Alpha => "[a-z]+",
            Constraint::Alphanum => "[a-z0-9]+",
        }
    }
}

impl std::fmt::Display for Constraint {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

/// One named path parameter discovered in a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleProperty {
    name: Box<str>,
    constraint: Constraint,
    /// ルール中に現れたままのトークン（例: `{id:numeric}`）
    raw: Box<str>,
}

impl RuleProperty {
    fn parse(rule: &str, token: &str) -> Result<RuleProperty, PatternError> {
        let malformed = || PatternError::MalformedParameter {
            rule: rule.to_string(),
            token: token.to_string(),
        };
        let inner = token
            .strip_prefix('{')
            .and_then(|t| t.strip_suffix('}'))
            .ok_or_else(malformed)?;
        let (name, constraint) = match inner.split_once(':') {
            Some((name, constraint)) => (name, Some(constraint)),
            None => (inner, None),
        };
        if !is_identifier(name) {
            return Err(malformed());
        }
        let constraint = match constraint {
            None => Constraint::Any,
            Some(c) => Constraint::from_str(c).ok_or_else(|| PatternError::UnknownConstraint {
                rule: rule.to_string(),
                constraint: c.to_string(),
            })?,
        };
        Ok(RuleProperty {
            name: name.into(),
            constraint,
            raw: token.into(),
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn constraint(&self) -> Constraint {
        self.constraint
    }

    #[inline]
    pub fn regex(&self) -> &'static str {
        self.constraint.regex()
    }

    #[inline]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// `[a-z][a-z0-9_]*`（大文字小文字を区別しない）
fn is_identifier(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Parameter bindings produced by a successful match.
///
/// Values are always the literal matched text; optional parameters that
/// did not take part in the match are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    // 大抵のルールはパラメータ 4 つ以下
    fields: SmallVec<[(Box<str>, String); 4]>,
}

impl Params {
    #[inline]
    pub fn new() -> Params {
        Params::default()
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| &**k == name)
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// 既存のキーは上書き
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| &**k == name) {
            Some((_, v)) => *v = value,
            None => self.fields.push((name.into(), value)),
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (&**k, v.as_str()))
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Params {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Result of compiling a rule: the anchored expression plus its parameters.
#[derive(Debug)]
pub struct CompiledRule {
    properties: Vec<RuleProperty>,
    regex: Regex,
}

impl CompiledRule {
    fn build(rule: &str) -> Result<CompiledRule, PatternError> {
        // 省略可能セグメントは末尾にしか置けない
        let without_optionals = rule.trim_end_matches(']');
        let closing = rule.len() - without_optionals.len();
        let opening = without_optionals.matches('[').count();
        if closing != opening {
            return Err(PatternError::UnbalancedOptionals(rule.to_string()));
        }
        if rule.matches('{').count() != rule.matches('}').count() {
            return Err(PatternError::UnbalancedBraces(rule.to_string()));
        }

        let mut properties: Vec<RuleProperty> = Vec::new();
        let mut expr = String::with_capacity(rule.len() * 2 + 8);
        expr.push_str("(?i)^");

        let mut depth = 0usize;
        let mut rest = rule;
        while let Some(pos) = rest.find(|c: char| matches!(c, '[' | ']' | '{')) {
            let (literal, tail) = rest.split_at(pos);
            expr.push_str(&regex::escape(literal));
            match tail.as_bytes()[0] {
                b'[' => {
                    depth += 1;
                    expr.push_str("(?:");
                    rest = &tail[1..];
                }
                b']' => {
                    if depth == 0 {
                        return Err(PatternError::UnbalancedOptionals(rule.to_string()));
                    }
                    depth -= 1;
                    expr.push_str(")?");
                    rest = &tail[1..];
                }
                _ => {
                    let end = tail
                        .find('}')
                        .ok_or_else(|| PatternError::UnbalancedBraces(rule.to_string()))?;
                    let property = RuleProperty::parse(rule, &tail[..=end])?;
                    if properties.iter().any(|p| p.name == property.name) {
                        return Err(PatternError::DuplicateParameter {
                            rule: rule.to_string(),
                            name: property.name.to_string(),
                        });
                    }
                    expr.push_str(&format!("(?P<{}>{})", property.name, property.regex()));
                    properties.push(property);
                    rest = &tail[end + 1..];
                }
            }
        }
        expr.push_str(&regex::escape(rest));
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|source| PatternError::Regex {
            rule: rule.to_string(),
            source,
        })?;
        Ok(CompiledRule { properties, regex })
    }

    #[inline]
    pub fn properties(&self) -> &[RuleProperty] {
        &self.properties
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    fn captures(&self, path: &str) -> Option<Params> {
        let caps = self.regex.captures(path)?;
        let mut params = Params::new();
        for property in &self.properties {
            if let Some(m) = caps.name(&property.name) {
                params.insert(&property.name, m.as_str());
            }
        }
        Some(params)
    }
}

/// A matcher for one path pattern.
#[derive(Debug)]
pub struct Rule {
    raw: Box<str>,
    compiled: OnceCell<CompiledRule>,
}

impl Rule {
    /// コンパイルは遅延される。登録時に検証したい場合は [`Rule::compile`] を呼ぶ
    #[inline]
    pub fn new(pattern: &str) -> Rule {
        Rule {
            raw: pattern.into(),
            compiled: OnceCell::new(),
        }
    }

    #[inline]
    pub fn pattern(&self) -> &str {
        &self.raw
    }

    #[inline]
    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    /// Compiles the rule once and caches the result.
    ///
    /// 並行して呼ばれても構築は一度だけ行われる。
    pub fn compile(&self) -> Result<&CompiledRule, PatternError> {
        self.compiled.get_or_try_init(|| {
            let compiled = CompiledRule::build(&self.raw);
            if let Err(e) = &compiled {
                log::error!("{}", e);
            }
            compiled
        })
    }

    /// Matches a normalized path.
    ///
    /// `Ok(None)` means the path is well formed but does not match.
    /// A path without a leading slash, or a non-root path with a trailing
    /// slash, is a caller bug and yields [`PathError`].
    pub fn matches(&self, path: &str) -> Result<Option<Params>, RoutingError> {
        check_path(path)?;
        Ok(self.compile()?.captures(path))
    }
}

/// 正規化済みパスかどうか
#[inline]
pub fn check_path(path: &str) -> Result<(), PathError> {
    if !path.starts_with('/') {
        return Err(PathError::MissingLeadingSlash(path.to_string()));
    }
    if path.len() > 1 && path.ends_with('/') {
        return Err(PathError::TrailingSlash(path.to_string()));
    }
    Ok(())
}

//! Request body validation.
//!
//! ルートの `validator` 設定に [`Validator`] を置き、[`ValidationService`]
//! をミドルウェアとして登録すると、ハンドラの前に JSON ボディが検証される。

use std::sync::Arc;

use log::debug;
use serde_json::Value;

use crate::{
    context::Context,
    error::{HttpError, ValidationError},
    middleware::Middleware,
    utils::status::status_code,
};

pub mod rules;

pub use rules::{BooleanRule, FieldRule, NumberRule, PatternRule, StringRule};

/// ルート設定でバリデータを置くキー
pub const VALIDATOR: &str = "validator";

/// Validates a decoded request body against declared fields.
pub trait Validator: Send + Sync {
    /// 検証対象のフィールドと、そのルール（宣言順に評価される）
    fn fields(&self) -> &[(String, Box<dyn FieldRule>)];

    /// 最初に失敗したフィールドで止まる
    fn validate(&self, data: &Value) -> Result<(), ValidationError> {
        for (field, rule) in self.fields() {
            let value = data.get(field.as_str()).filter(|v| !v.is_null());
            rule.check(value).map_err(|reason| ValidationError {
                field: field.clone(),
                reason,
            })?;
        }
        Ok(())
    }

    #[inline]
    fn is_valid(&self, data: &Value) -> bool {
        self.validate(data).is_ok()
    }
}

/// Static field declaration list.
#[derive(Default)]
pub struct Schema {
    fields: Vec<(String, Box<dyn FieldRule>)>,
}

impl Schema {
    pub fn new() -> Schema {
        Schema::default()
    }

    /// 同名のフィールドは置き換える
    pub fn field<R: FieldRule + 'static>(mut self, name: &str, rule: R) -> Self {
        let rule: Box<dyn FieldRule> = Box::new(rule);
        match self.fields.iter().position(|(n, _)| n == name) {
            Some(idx) => self.fields[idx].1 = rule,
            None => self.fields.push((name.to_string(), rule)),
        }
        self
    }
}

impl Validator for Schema {
    #[inline]
    fn fields(&self) -> &[(String, Box<dyn FieldRule>)] {
        &self.fields
    }
}

/// Nested object field checked against its own schema.
pub struct ObjectRule {
    required: bool,
    schema: Schema,
}

impl ObjectRule {
    pub fn new(schema: Schema) -> ObjectRule {
        ObjectRule { required: false, schema }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

impl FieldRule for ObjectRule {
    fn check(&self, value: Option<&Value>) -> Result<(), String> {
        match value {
            None if self.required => Err("is required".to_string()),
            None => Ok(()),
            Some(value) if value.is_object() => self.schema.validate(value).map_err(|e| e.to_string()),
            Some(_) => Err("is not an object".to_string()),
        }
    }
}

/// Middleware that checks the route's `validator` setting before the handler.
///
/// 空のボディは null として扱う。JSON として読めなければ 400、
/// 検証に失敗すれば 422。
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationService;

impl ValidationService {
    pub fn new() -> ValidationService {
        ValidationService
    }
}

#[async_trait::async_trait]
impl<C> Middleware<C> for ValidationService
where
    C: Send + Sync + 'static,
{
    async fn before(&self, ctx: &mut Context<C>) -> Result<(), HttpError> {
        let Some(validator) = ctx.setting::<Arc<dyn Validator>>(VALIDATOR).cloned() else {
            return Ok(());
        };
        let data: Value = if ctx.req.body.is_empty() {
            Value::Null
        } else {
            ctx.req.json()?
        };
        if let Err(e) = validator.validate(&data) {
            debug!("validation failed on {}: {}", ctx.route.name(), e);
            return Err(HttpError::CUSTOM(
                status_code::UNPROCESSABLE_ENTITY,
                format!("Could not validate request: {}", e),
            ));
        }
        Ok(())
    }
}

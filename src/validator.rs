// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 验证器模块
//!
//! 验证器检查一个元数据节点的当前值（必要时参考其容器值），产生零个或多个验证结果。
//! 普通的无效输入不会让验证器失败，只会体现为结果。
//!
//! `ValidatorProvider` 给出某个元数据节点适用的验证器列表；
//! `CachedValidatorProvider` 用 LRU 缓存按属性记住这些列表。

use std::{
    collections::HashMap,
    fmt,
    num::NonZeroUsize,
    sync::{Arc, Mutex},
};

use log::{error, warn};
use lru::LruCache;
use regex::Regex;

use crate::{
    metadata::{ModelMetadata, ValidationRule},
    model::ModelValue,
    util::lock_or_recover,
};

/// 单条验证结果。`member_name` 为空表示错误属于被验证的值本身。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelValidationResult {
    pub member_name: String,
    pub message: String,
}

impl ModelValidationResult {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            member_name: String::new(),
            message: message.into(),
        }
    }

    pub fn for_member(member_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            member_name: member_name.into(),
            message: message.into(),
        }
    }
}

pub trait ModelValidator: Send + Sync {
    fn validate(&self, metadata: &ModelMetadata, container: Option<&ModelValue>) -> Vec<ModelValidationResult>;
}

/// 必填：空值或只含空白的字符串无效
#[derive(Debug, Clone, Copy, Default)]
pub struct RequiredValidator;

impl ModelValidator for RequiredValidator {
    fn validate(&self, metadata: &ModelMetadata, _container: Option<&ModelValue>) -> Vec<ModelValidationResult> {
        let missing = match metadata.model() {
            ModelValue::Null => true,
            ModelValue::Text(s) => s.trim().is_empty(),
            _ => false,
        };
        if missing {
            vec![ModelValidationResult::new(format!(
                "The {} field is required.",
                metadata.get_display_name()
            ))]
        } else {
            Vec::new()
        }
    }
}

/// 数值范围（闭区间），非数值不检查
#[derive(Debug, Clone, Copy)]
pub struct RangeValidator {
    min: f64,
    max: f64,
}

impl RangeValidator {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

impl ModelValidator for RangeValidator {
    fn validate(&self, metadata: &ModelMetadata, _container: Option<&ModelValue>) -> Vec<ModelValidationResult> {
        match metadata.model().as_f64() {
            Some(n) if n < self.min || n > self.max => vec![ModelValidationResult::new(format!(
                "The field {} must be between {} and {}.",
                metadata.get_display_name(),
                self.min,
                self.max
            ))],
            _ => Vec::new(),
        }
    }
}

/// 字符串长度（按字符计），非字符串不检查
#[derive(Debug, Clone, Copy)]
pub struct StringLengthValidator {
    min: usize,
    max: usize,
}

impl StringLengthValidator {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }
}

impl ModelValidator for StringLengthValidator {
    fn validate(&self, metadata: &ModelMetadata, _container: Option<&ModelValue>) -> Vec<ModelValidationResult> {
        let Some(text) = metadata.model().as_str() else {
            return Vec::new();
        };
        let length = text.chars().count();
        if length >= self.min && length <= self.max {
            return Vec::new();
        }
        let message = if self.min == 0 {
            format!(
                "The field {} must be a string with a maximum length of {}.",
                metadata.get_display_name(),
                self.max
            )
        } else {
            format!(
                "The field {} must be a string with a minimum length of {} and a maximum length of {}.",
                metadata.get_display_name(),
                self.min,
                self.max
            )
        };
        vec![ModelValidationResult::new(message)]
    }
}

/// 正则表达式，要求整个字符串匹配
#[derive(Debug, Clone)]
pub struct RegexValidator {
    pattern: String,
    regex: Regex,
}

impl RegexValidator {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})$", pattern))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl ModelValidator for RegexValidator {
    fn validate(&self, metadata: &ModelMetadata, _container: Option<&ModelValue>) -> Vec<ModelValidationResult> {
        match metadata.model().as_str() {
            Some(text) if !text.is_empty() && !self.regex.is_match(text) => {
                vec![ModelValidationResult::new(format!(
                    "The field {} must match the regular expression '{}'.",
                    metadata.get_display_name(),
                    self.pattern
                ))]
            }
            _ => Vec::new(),
        }
    }
}

/// 由闭包实现的验证器
pub struct FnValidator<F> {
    f: F,
}

pub fn validator_fn<F>(f: F) -> FnValidator<F>
where
    F: Fn(&ModelMetadata, Option<&ModelValue>) -> Vec<ModelValidationResult> + Send + Sync,
{
    FnValidator { f }
}

impl<F> ModelValidator for FnValidator<F>
where
    F: Fn(&ModelMetadata, Option<&ModelValue>) -> Vec<ModelValidationResult> + Send + Sync,
{
    fn validate(&self, metadata: &ModelMetadata, container: Option<&ModelValue>) -> Vec<ModelValidationResult> {
        (self.f)(metadata, container)
    }
}

/// 给出某个元数据节点适用的验证器，顺序即执行顺序
pub trait ValidatorProvider: Send + Sync {
    fn validators_for(&self, metadata: &ModelMetadata) -> Vec<Arc<dyn ModelValidator>>;
}

/// 把属性上声明的规则映射为内置验证器
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleValidatorProvider;

impl ValidatorProvider for RuleValidatorProvider {
    fn validators_for(&self, metadata: &ModelMetadata) -> Vec<Arc<dyn ModelValidator>> {
        let mut validators: Vec<Arc<dyn ModelValidator>> = Vec::new();
        for rule in metadata.rules() {
            match rule {
                ValidationRule::Required => validators.push(Arc::new(RequiredValidator)),
                ValidationRule::Range { min, max } => {
                    validators.push(Arc::new(RangeValidator::new(*min, *max)))
                }
                ValidationRule::StringLength { min, max } => {
                    validators.push(Arc::new(StringLengthValidator::new(*min, *max)))
                }
                ValidationRule::Pattern(pattern) => match RegexValidator::new(pattern) {
                    Ok(validator) => validators.push(Arc::new(validator)),
                    Err(e) => error!(
                        "属性 {} 的正则表达式 '{}' 无效，已忽略: {}",
                        metadata.get_display_name(),
                        pattern,
                        e
                    ),
                },
            }
        }
        validators
    }
}

/// 按模型类型注册的验证器，适用于该类型的每一个值
#[derive(Default)]
pub struct TypeValidatorProvider {
    validators: HashMap<String, Vec<Arc<dyn ModelValidator>>>,
}

impl TypeValidatorProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, model_type: impl Into<String>, validator: Arc<dyn ModelValidator>) -> Self {
        self.validators.entry(model_type.into()).or_default().push(validator);
        self
    }
}

impl ValidatorProvider for TypeValidatorProvider {
    fn validators_for(&self, metadata: &ModelMetadata) -> Vec<Arc<dyn ModelValidator>> {
        self.validators
            .get(metadata.model_type())
            .cloned()
            .unwrap_or_default()
    }
}

impl fmt::Debug for TypeValidatorProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeValidatorProvider")
            .field("types", &self.validators.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// 依次拼接多个提供者的结果
#[derive(Default)]
pub struct CompositeValidatorProvider {
    providers: Vec<Arc<dyn ValidatorProvider>>,
}

impl CompositeValidatorProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: Arc<dyn ValidatorProvider>) -> Self {
        self.providers.push(provider);
        self
    }
}

impl ValidatorProvider for CompositeValidatorProvider {
    fn validators_for(&self, metadata: &ModelMetadata) -> Vec<Arc<dyn ModelValidator>> {
        self.providers
            .iter()
            .flat_map(|provider| provider.validators_for(metadata))
            .collect()
    }
}

/// 缓存键：容器类型、属性名、模型类型
type ValidatorKey = (Option<String>, Option<String>, String);

/// 用 LRU 缓存记住每个属性适用的验证器列表。
///
/// 验证器只取决于声明信息，不取决于当前值，因此可以跨请求复用。
pub struct CachedValidatorProvider {
    inner: Arc<dyn ValidatorProvider>,
    cache: Mutex<LruCache<ValidatorKey, Vec<Arc<dyn ModelValidator>>>>,
}

impl CachedValidatorProvider {
    pub fn new(inner: Arc<dyn ValidatorProvider>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or_else(|| {
            warn!("验证器缓存容量被设置为0，将改为1");
            NonZeroUsize::MIN
        });
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        lock_or_recover(&self.cache, "验证器缓存").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ValidatorProvider for CachedValidatorProvider {
    fn validators_for(&self, metadata: &ModelMetadata) -> Vec<Arc<dyn ModelValidator>> {
        let key: ValidatorKey = (
            metadata.container_type().map(str::to_string),
            metadata.property_name().map(str::to_string),
            metadata.model_type().to_string(),
        );
        if let Some(validators) = lock_or_recover(&self.cache, "验证器缓存").get(&key) {
            return validators.clone();
        }
        // 计算期间不持有锁，内部提供者可能较慢
        let validators = self.inner.validators_for(metadata);
        lock_or_recover(&self.cache, "验证器缓存").put(key, validators.clone());
        validators
    }
}

impl fmt::Debug for CachedValidatorProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedValidatorProvider")
            .field("len", &self.len())
            .finish()
    }
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模型元数据模块
//!
//! - `TypeDescriptor` / `TypeRegistry`：声明模型类型的属性、显示名与验证规则，
//!   并负责把 JSON 请求体绑定为 `ModelValue`。
//! - `ModelMetadata`：某一个逻辑值的元数据快照（当前值、类型、容器类型、显示名、属性）。
//! - `MetadataProvider`：给定模型实例及其声明类型，计算新的元数据。

use std::{collections::HashMap, fmt, sync::Arc};

use log::debug;
use serde_json::Value;

use crate::model::*;

/// 列表类型名的后缀，例如 `Item[]`
const LIST_SUFFIX: &str = "[]";

/// 列表类型的元素类型，非列表类型返回 `None`
pub fn element_type(type_name: &str) -> Option<&str> {
    type_name.strip_suffix(LIST_SUFFIX)
}

/// 声明在属性上的验证规则
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationRule {
    Required,
    Range { min: f64, max: f64 },
    StringLength { min: usize, max: usize },
    Pattern(String),
}

#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    name: String,
    type_name: String,
    display_name: Option<String>,
    rules: Vec<ValidationRule>,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            display_name: None,
            rules: Vec::new(),
        }
    }

    pub fn display(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

/// 模型类型声明，属性按声明顺序保存
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    name: String,
    properties: Vec<PropertyDescriptor>,
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }
}

#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, TypeDescriptor>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: TypeDescriptor) {
        self.types.insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.types.get(type_name)
    }

    /// 按声明类型把 JSON 值绑定为模型值。
    ///
    /// 缺失的属性、类型不匹配的值以及未注册的类型都绑定为 `Null`，
    /// 交给验证阶段报告，绑定本身不会失败。
    pub fn bind(&self, json: &Value, type_name: &str) -> ModelValue {
        if let Some(item_type) = element_type(type_name) {
            return match json {
                Value::Array(items) => {
                    ModelValue::List(items.iter().map(|item| self.bind(item, item_type)).collect())
                }
                _ => self.mismatch(json, type_name),
            };
        }
        match (type_name, json) {
            (_, Value::Null) => ModelValue::Null,
            (BOOL_TYPE, Value::Bool(b)) => ModelValue::Bool(*b),
            (INT_TYPE, Value::Number(n)) => match n.as_i64() {
                Some(i) => ModelValue::Int(i),
                None => self.mismatch(json, type_name),
            },
            (FLOAT_TYPE, Value::Number(n)) => match n.as_f64() {
                Some(f) => ModelValue::Float(f),
                None => self.mismatch(json, type_name),
            },
            (STRING_TYPE, Value::String(s)) => ModelValue::Text(s.clone()),
            (_, Value::Object(map)) => match self.get(type_name) {
                Some(descriptor) => {
                    let mut object = ModelObject::new(type_name);
                    for property in descriptor.properties() {
                        let value = map
                            .get(property.name())
                            .map_or(ModelValue::Null, |v| self.bind(v, property.type_name()));
                        object.set(property.name(), value);
                    }
                    ModelValue::Object(object)
                }
                None => self.mismatch(json, type_name),
            },
            _ => self.mismatch(json, type_name),
        }
    }

    fn mismatch(&self, json: &Value, type_name: &str) -> ModelValue {
        debug!("JSON 值 {} 无法绑定为类型 {}，按空值处理", json, type_name);
        ModelValue::Null
    }
}

/// 一个逻辑值的元数据快照
#[derive(Debug, Clone)]
pub struct ModelMetadata {
    model: ModelValue,
    model_type: String,
    container_type: Option<String>,
    property_name: Option<String>,
    display_name: Option<String>,
    rules: Vec<ValidationRule>,
    properties: Vec<Arc<ModelMetadata>>,
}

impl ModelMetadata {
    /// 没有容器的顶层值
    pub fn new(model: ModelValue, model_type: impl Into<String>) -> Self {
        Self {
            model,
            model_type: model_type.into(),
            container_type: None,
            property_name: None,
            display_name: None,
            rules: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// 容器类型上某个声明属性的值
    pub fn for_property(container_type: &str, property: &PropertyDescriptor, model: ModelValue) -> Self {
        Self {
            model,
            model_type: property.type_name.clone(),
            container_type: Some(container_type.to_string()),
            property_name: Some(property.name.clone()),
            display_name: property.display_name.clone(),
            rules: property.rules.clone(),
            properties: Vec::new(),
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_properties(mut self, properties: Vec<Arc<ModelMetadata>>) -> Self {
        self.properties = properties;
        self
    }

    pub fn model(&self) -> &ModelValue {
        &self.model
    }

    pub fn model_type(&self) -> &str {
        &self.model_type
    }

    pub fn container_type(&self) -> Option<&str> {
        self.container_type.as_deref()
    }

    pub fn property_name(&self) -> Option<&str> {
        self.property_name.as_deref()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    pub fn properties(&self) -> &[Arc<ModelMetadata>] {
        &self.properties
    }

    /// 显示名，依次回退到属性名、类型名
    pub fn get_display_name(&self) -> String {
        self.display_name
            .as_deref()
            .or(self.property_name.as_deref())
            .unwrap_or(&self.model_type)
            .to_string()
    }
}

/// 元数据来源
pub trait MetadataProvider: Send + Sync {
    /// 为给定实例及其声明类型计算新的元数据，包括声明的属性
    fn metadata_for_type(&self, model: ModelValue, model_type: &str) -> ModelMetadata;
}

/// 由 `TypeRegistry` 中的类型声明计算元数据
pub struct DescriptorMetadataProvider {
    registry: Arc<TypeRegistry>,
}

impl DescriptorMetadataProvider {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    // 只有对象值才展开属性，空值或基础类型没有可供遍历的属性
    fn properties_of(&self, model: &ModelValue, model_type: &str) -> Vec<Arc<ModelMetadata>> {
        let (ModelValue::Object(object), Some(descriptor)) = (model, self.registry.get(model_type)) else {
            return Vec::new();
        };
        descriptor
            .properties()
            .iter()
            .map(|property| {
                let value = object.get(property.name()).cloned().unwrap_or(ModelValue::Null);
                let nested = self.properties_of(&value, property.type_name());
                Arc::new(ModelMetadata::for_property(model_type, property, value).with_properties(nested))
            })
            .collect()
    }
}

impl MetadataProvider for DescriptorMetadataProvider {
    fn metadata_for_type(&self, model: ModelValue, model_type: &str) -> ModelMetadata {
        let properties = self.properties_of(&model, model_type);
        ModelMetadata::new(model, model_type).with_properties(properties)
    }
}

impl fmt::Debug for DescriptorMetadataProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorMetadataProvider")
            .field("types", &self.registry.types.len())
            .finish()
    }
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模型值模块
//!
//! 绑定后的模型图以动态值表示。对象值携带运行时类型名，
//! 验证树据此判断父节点的值是否是期望的容器类型实例。

use serde_json::{Map, Value};

/// 基础类型的运行时类型名
pub const BOOL_TYPE: &str = "bool";
pub const INT_TYPE: &str = "int";
pub const FLOAT_TYPE: &str = "float";
pub const STRING_TYPE: &str = "string";
pub const LIST_TYPE: &str = "list";

#[derive(Debug, Clone, PartialEq)]
pub enum ModelValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<ModelValue>),
    Object(ModelObject),
}

/// 带类型名的对象值，属性按声明顺序保存
#[derive(Debug, Clone, PartialEq)]
pub struct ModelObject {
    type_name: String,
    properties: Vec<(String, ModelValue)>,
}

impl ModelObject {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            properties: Vec::new(),
        }
    }

    /// 构造器风格地设置属性
    pub fn with(mut self, name: impl Into<String>, value: ModelValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: ModelValue) {
        let name = name.into();
        match self.properties.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.properties.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelValue> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn properties(&self) -> &[(String, ModelValue)] {
        &self.properties
    }
}

impl ModelValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ModelValue::Null)
    }

    /// 运行时类型名，`Null` 没有类型
    pub fn type_name(&self) -> Option<&str> {
        match self {
            ModelValue::Null => None,
            ModelValue::Bool(_) => Some(BOOL_TYPE),
            ModelValue::Int(_) => Some(INT_TYPE),
            ModelValue::Float(_) => Some(FLOAT_TYPE),
            ModelValue::Text(_) => Some(STRING_TYPE),
            ModelValue::List(_) => Some(LIST_TYPE),
            ModelValue::Object(object) => Some(object.type_name()),
        }
    }

    /// 是否为给定类型的实例
    pub fn is_instance_of(&self, type_name: &str) -> bool {
        self.type_name() == Some(type_name)
    }

    /// 读取对象属性，非对象值返回 `None`
    pub fn property(&self, name: &str) -> Option<&ModelValue> {
        match self {
            ModelValue::Object(object) => object.get(name),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ModelValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ModelValue::Int(i) => Some(*i as f64),
            ModelValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// 转换为 JSON，对象的类型名不会输出
    pub fn to_json(&self) -> Value {
        match self {
            ModelValue::Null => Value::Null,
            ModelValue::Bool(b) => Value::Bool(*b),
            ModelValue::Int(i) => Value::from(*i),
            ModelValue::Float(f) => Value::from(*f),
            ModelValue::Text(s) => Value::String(s.clone()),
            ModelValue::List(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
            ModelValue::Object(object) => {
                let mut map = Map::new();
                for (name, value) in object.properties() {
                    map.insert(name.clone(), value.to_json());
                }
                Value::Object(map)
            }
        }
    }
}

impl From<ModelObject> for ModelValue {
    fn from(object: ModelObject) -> Self {
        ModelValue::Object(object)
    }
}

impl From<&str> for ModelValue {
    fn from(s: &str) -> Self {
        ModelValue::Text(s.to_string())
    }
}

impl From<i64> for ModelValue {
    fn from(i: i64) -> Self {
        ModelValue::Int(i)
    }
}

impl From<f64> for ModelValue {
    fn from(f: f64) -> Self {
        ModelValue::Float(f)
    }
}

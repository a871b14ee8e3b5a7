// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模型状态模块
//!
//! 一次验证过程中共享的错误存储。键是值在模型图中的路径（如 `order.Items[0].Price`），
//! 按首次出现的顺序保存，比较时不区分 ASCII 大小写。

use serde_json::{Map, Value};

/// 拼接属性路径，任一部分为空时返回另一部分
pub fn property_key(prefix: &str, name: &str) -> String {
    match (prefix.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{}.{}", prefix, name),
    }
}

/// 列表元素的路径
pub fn index_key(prefix: &str, index: usize) -> String {
    format!("{}[{}]", prefix, index)
}

#[derive(Debug, Clone, Default)]
pub struct ModelState {
    entries: Vec<(String, Vec<String>)>,
}

impl ModelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, key: &str, message: impl Into<String>) {
        let message = message.into();
        match self.entries.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
            Some((_, errors)) => errors.push(message),
            None => self.entries.push((key.to_string(), vec![message])),
        }
    }

    /// 给定路径本身是否没有错误。只看这一个键，不看它下面的子路径。
    pub fn is_valid_field(&self, key: &str) -> bool {
        self.errors(key).is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn errors(&self, key: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, errors)| errors.as_slice())
            .unwrap_or(&[])
    }

    pub fn error_count(&self) -> usize {
        self.entries.iter().map(|(_, errors)| errors.len()).sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// 形如 `{"order.Id": ["..."]}` 的错误响应体
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (key, errors) in &self.entries {
            map.insert(key.clone(), Value::from(errors.clone()));
        }
        Value::Object(map)
    }
}

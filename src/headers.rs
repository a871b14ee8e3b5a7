// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 标头集合模块
//!
//! 有序、大小写不敏感的标头多值映射（name → 有序的值列表）。
//! 每个集合有一个类别：普通标头（请求/响应标头）或内容标头，
//! 集合会拒绝不属于自己类别的标头名称。

use lazy_static::lazy_static;
use regex::Regex;

use crate::{exception::Exception, param::CONTENT_HEADERS};

lazy_static! {
    /// RFC 9110 中 token 的字符集
    static ref TOKEN: Regex = Regex::new(r"^[!#$%&'*+\-.^_`|~0-9A-Za-z]+$").unwrap();
}

/// 标头集合的类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderClass {
    /// 请求标头或响应标头
    General,
    /// 附着在消息体上的内容标头
    Content,
}

#[derive(Debug, Clone)]
pub struct HeaderMap {
    class: HeaderClass,
    entries: Vec<(String, Vec<String>)>,
}

impl HeaderMap {
    pub fn new(class: HeaderClass) -> Self {
        Self {
            class,
            entries: Vec::new(),
        }
    }

    pub fn class(&self) -> HeaderClass {
        self.class
    }

    /// 判断某个标头名称是否可以进入该类别的集合。
    pub fn accepts(&self, name: &str) -> bool {
        let is_content = is_content_header(name);
        match self.class {
            HeaderClass::General => !is_content,
            HeaderClass::Content => is_content,
        }
    }

    /// 追加一个标头值。名称非法、值含换行或类别不符时返回错误，集合保持不变。
    pub fn try_add(&mut self, name: &str, value: &str) -> Result<(), Exception> {
        if !TOKEN.is_match(name) {
            return Err(Exception::InvalidHeaderName(name.to_string()));
        }
        if value.contains('\r') || value.contains('\n') {
            return Err(Exception::InvalidHeaderValue(name.to_string()));
        }
        if !self.accepts(name) {
            return Err(Exception::MisplacedHeader(name.to_string()));
        }
        match self.position(name) {
            Some(index) => self.entries[index].1.push(value.to_string()),
            None => self
                .entries
                .push((name.to_string(), vec![value.to_string()])),
        }
        Ok(())
    }

    /// 用单个值替换已有的所有值。
    pub fn try_set(&mut self, name: &str, value: &str) -> Result<(), Exception> {
        self.remove(name);
        self.try_add(name, value)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// 获取某个标头的全部值（按追加顺序）
    pub fn get_all(&self, name: &str) -> &[String] {
        match self.position(name) {
            Some(index) => &self.entries[index].1,
            None => &[],
        }
    }

    /// 获取某个标头的第一个值
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(|v| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

/// 是否属于内容标头
pub fn is_content_header(name: &str) -> bool {
    CONTENT_HEADERS.contains(name.to_ascii_lowercase().as_str())
}

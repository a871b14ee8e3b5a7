// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 宿主抽象模块
//!
//! 桥接层只通过这里定义的窄接口与宿主交互：
//! - `HostRequest`：方法名、URL、标头、输入字节流、已认证主体。
//! - `HostResponse`：状态码、原因短语、标头追加、输出字节流、缓存策略、缓冲开关、
//!   “跳过自定义错误页”开关。
//! - `HostContext`：一次宿主请求的上下文，持有上述两者与请求 ID。

use std::{collections::BTreeMap, fmt, sync::Arc};

use tokio::io::AsyncWrite;

use crate::{exception::Exception, message::BodyStream};

/// 已认证的用户主体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub authentication_type: String,
}

/// 宿主响应的缓存策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cacheability {
    /// 禁止任何缓存
    NoCache,
    /// 仅允许客户端缓存
    Private,
    /// 允许代理服务器缓存
    Public,
}

impl fmt::Display for Cacheability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cacheability::NoCache => write!(f, "no-cache"),
            Cacheability::Private => write!(f, "private"),
            Cacheability::Public => write!(f, "public"),
        }
    }
}

/// 路由匹配结果：路由模板与捕获的值
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteData {
    pub template: String,
    pub values: BTreeMap<String, String>,
}

impl RouteData {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

/// 宿主原生的请求抽象
pub trait HostRequest: Send + Sync {
    /// 原始方法名
    fn method(&self) -> &str;
    /// 请求 URL（路径与查询字符串）
    fn url(&self) -> &str;
    /// 按出现顺序排列的标头名/值对
    fn headers(&self) -> Vec<(String, String)>;
    /// 打开输入字节流
    fn input_stream(&self) -> Result<BodyStream, Exception>;
    /// 已认证主体
    fn principal(&self) -> Option<Principal>;
}

/// 宿主原生的响应抽象
pub trait HostResponse: Send {
    fn set_status_code(&mut self, code: u16);
    fn set_reason_phrase(&mut self, reason: &str);
    fn append_header(&mut self, name: &str, value: &str) -> Result<(), Exception>;
    fn set_cacheability(&mut self, cacheability: Cacheability);
    fn set_buffer_output(&mut self, buffer: bool);
    fn set_skip_custom_errors(&mut self, skip: bool);
    fn output_stream(&mut self) -> &mut (dyn AsyncWrite + Send + Unpin);
}

/// 共享的宿主响应
pub type SharedHostResponse = Arc<tokio::sync::Mutex<dyn HostResponse>>;

/// 一次宿主请求的上下文
pub struct HostContext {
    id: u128,
    request: Arc<dyn HostRequest>,
    response: SharedHostResponse,
}

impl HostContext {
    pub fn new(id: u128, request: Arc<dyn HostRequest>, response: SharedHostResponse) -> Self {
        Self {
            id,
            request,
            response,
        }
    }

    pub fn id(&self) -> u128 {
        self.id
    }

    pub fn request(&self) -> &dyn HostRequest {
        self.request.as_ref()
    }

    pub fn response(&self) -> &SharedHostResponse {
        &self.response
    }
}

impl fmt::Debug for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostContext")
            .field("id", &self.id)
            .field("method", &self.request.method())
            .field("url", &self.request.url())
            .finish()
    }
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了桥接层与验证树在处理请求过程中可能产生的各类异常情况。
//!
//! ## 设计意图
//! - **错误分类**：涵盖了宿主请求解析错误、标头错误、资源释放后的访问、取消以及管道内部故障。
//! - **身份保持**：管道故障与 I/O 错误以 `Arc` 持有原始错误，`Clone` 之后依然指向同一个错误对象，
//!   便于 End 调用原样抛出内部原因。
//! - **用户友好**：通过实现 `std::fmt::Display`，确保错误信息可以被安全地记录到日志中。

use std::{error::Error, fmt, io, sync::Arc};

/// 桥接层处理请求过程中发生的异常类型。
#[derive(Debug, Clone)]
pub enum Exception {
    /// 宿主传入的请求字节流无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 请求行缺少方法、路径或协议版本。
    MalformedRequestLine,
    /// 宿主使用了不支持的 HTTP 协议版本。
    UnsupportedHttpVersion,
    /// 标头名称不是合法的 token。
    InvalidHeaderName(String),
    /// 标头值中包含 CR/LF 等非法字符。
    InvalidHeaderValue(String),
    /// 标头不属于该集合的类别（例如把 `Content-Type` 加入普通请求头集合）。
    MisplacedHeader(String),
    /// 对象已经被释放，拒绝任何修改。
    Disposed(&'static str),
    /// 请求体或响应体已被读取过一次。
    ContentConsumed,
    /// 异步操作被取消。
    OperationCanceled,
    /// 读写流时的 I/O 错误。
    Io(Arc<io::Error>),
    /// 管道内部抛出的原始错误。
    Pipeline(Arc<dyn Error + Send + Sync>),
    /// 后台任务发生 panic，附带 panic 信息。
    Panicked(String),
    /// 配置文件无法读取。
    Config(String),
}

use Exception::*;

impl Exception {
    /// 将任意错误包装为管道故障，保留原始错误对象。
    pub fn pipeline<E>(error: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        Pipeline(Arc::new(error))
    }

    /// 是否为取消。
    pub fn is_canceled(&self) -> bool {
        matches!(self, OperationCanceled)
    }
}

impl From<io::Error> for Exception {
    fn from(error: io::Error) -> Self {
        Io(Arc::new(error))
    }
}

/// 为 `Exception` 实现 `Display` 特性，使其支持字符串格式化输出。
impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            MalformedRequestLine => write!(f, "Malformed request line"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            InvalidHeaderName(name) => write!(f, "Invalid header name: {:?}", name),
            InvalidHeaderValue(name) => write!(f, "Invalid value for header {}", name),
            MisplacedHeader(name) => write!(f, "Header {} is not allowed in this collection", name),
            Disposed(what) => write!(f, "Cannot access a disposed object: {}", what),
            ContentConsumed => write!(f, "Content stream has already been read"),
            OperationCanceled => write!(f, "The operation was canceled"),
            Io(e) => write!(f, "I/O error: {}", e),
            Pipeline(e) => write!(f, "{}", e),
            Panicked(msg) => write!(f, "Background task panicked: {}", msg),
            Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for Exception {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Io(e) => Some(e.as_ref()),
            Pipeline(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

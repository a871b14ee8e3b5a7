// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 管道消息模块
//!
//! 定义管道侧的请求/响应消息：
//! - `PipelineRequest`：方法、URI、请求标头、消息体、属性袋以及请求范围内需要释放的资源。
//! - `PipelineResponse`：状态码、原因短语、响应标头以及可选的消息体。
//! - `Content`：带有内容标头的字节流。
//!
//! 请求与响应都是共享状态的句柄，克隆后指向同一个对象；
//! 一旦调用 `dispose`，所有修改操作都会返回 `Exception::Disposed`。

use std::{
    any::Any,
    collections::HashMap,
    fmt, io,
    sync::{Arc, Mutex},
};

use bytes::Bytes;
use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::{
    exception::Exception,
    headers::{HeaderClass, HeaderMap},
    param::{reason_phrase, HttpMethod},
    util::lock_or_recover,
};

/// 消息体字节流
pub type BodyStream = Box<dyn AsyncRead + Send + Unpin>;

/// 属性袋中的值
pub type Property = Arc<dyn Any + Send + Sync>;

/// 请求范围内的资源，在响应写出完毕后统一释放。
pub trait Disposable: Send {
    fn dispose(&mut self);
}

impl<F> Disposable for F
where
    F: FnMut() + Send,
{
    fn dispose(&mut self) {
        self()
    }
}

/// 带内容标头的消息体
pub struct Content {
    headers: HeaderMap,
    stream: Option<BodyStream>,
}

impl Content {
    /// 包装任意字节流，不设置任何内容标头。
    pub fn from_stream(stream: BodyStream) -> Self {
        Self {
            headers: HeaderMap::new(HeaderClass::Content),
            stream: Some(stream),
        }
    }

    /// 由内存中的字节构造，自动设置 `Content-Length`。
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes: Bytes = bytes.into();
        let mut content = Self::from_stream(Box::new(io::Cursor::new(bytes.clone())));
        // Content-Length 是合法的内容标头，不会失败
        let set = content.headers.try_set("Content-Length", &bytes.len().to_string());
        debug_assert!(set.is_ok());
        content
    }

    /// 由文本构造，同时设置 `Content-Type`。
    pub fn from_text(text: impl Into<String>, media_type: &str) -> Self {
        let mut content = Self::from_bytes(text.into());
        if let Err(e) = content.headers.try_set("Content-Type", media_type) {
            warn!("媒体类型{:?}无法作为Content-Type，已忽略：{}", media_type, e);
        }
        content
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// 消息体是否还未被读取
    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// 把消息体复制到输出流，返回复制的字节数。消息体只能被读取一次。
    pub async fn copy_to<W>(&mut self, out: &mut W, buffer_size: usize) -> Result<u64, Exception>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let stream = self.stream.take().ok_or(Exception::ContentConsumed)?;
        let mut reader = BufReader::with_capacity(buffer_size.max(1), stream);
        let copied = tokio::io::copy_buf(&mut reader, out).await?;
        out.flush().await?;
        debug!("消息体复制完成，共 {} 字节", copied);
        Ok(copied)
    }

    /// 把消息体完整读入内存。
    pub async fn read_to_bytes(&mut self) -> Result<Bytes, Exception> {
        let mut stream = self.stream.take().ok_or(Exception::ContentConsumed)?;
        let mut buffer = Vec::new();
        stream.read_to_end(&mut buffer).await?;
        Ok(Bytes::from(buffer))
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Content")
            .field("headers", &self.headers)
            .field("has_stream", &self.stream.is_some())
            .finish()
    }
}

struct RequestState {
    method: HttpMethod,
    uri: String,
    headers: HeaderMap,
    content: Option<Content>,
    properties: HashMap<String, Property>,
    resources: Vec<Box<dyn Disposable>>,
    disposed: bool,
}

/// 管道侧的请求消息
#[derive(Clone)]
pub struct PipelineRequest {
    state: Arc<Mutex<RequestState>>,
}

impl PipelineRequest {
    pub fn new(method: HttpMethod, uri: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(RequestState {
                method,
                uri: uri.into(),
                headers: HeaderMap::new(HeaderClass::General),
                content: None,
                properties: HashMap::new(),
                resources: Vec::new(),
                disposed: false,
            })),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut RequestState) -> Result<R, Exception>) -> Result<R, Exception> {
        let mut state = lock_or_recover(&self.state, "PipelineRequest");
        if state.disposed {
            return Err(Exception::Disposed("PipelineRequest"));
        }
        f(&mut state)
    }

    pub fn method(&self) -> HttpMethod {
        lock_or_recover(&self.state, "PipelineRequest").method.clone()
    }

    pub fn uri(&self) -> String {
        lock_or_recover(&self.state, "PipelineRequest").uri.clone()
    }

    /// 请求标头的快照
    pub fn headers(&self) -> HeaderMap {
        lock_or_recover(&self.state, "PipelineRequest").headers.clone()
    }

    /// 内容标头的快照，没有消息体时返回 `None`
    pub fn content_headers(&self) -> Option<HeaderMap> {
        let state = lock_or_recover(&self.state, "PipelineRequest");
        state.content.as_ref().map(|c| c.headers().clone())
    }

    pub fn has_content(&self) -> bool {
        lock_or_recover(&self.state, "PipelineRequest").content.is_some()
    }

    pub fn try_add_header(&self, name: &str, value: &str) -> Result<(), Exception> {
        self.with_state(|state| state.headers.try_add(name, value))
    }

    /// 向消息体的内容标头集合追加标头；没有消息体时视为类别不符。
    pub fn try_add_content_header(&self, name: &str, value: &str) -> Result<(), Exception> {
        self.with_state(|state| match state.content.as_mut() {
            Some(content) => content.headers_mut().try_add(name, value),
            None => Err(Exception::MisplacedHeader(name.to_string())),
        })
    }

    pub fn set_content(&self, content: Content) -> Result<(), Exception> {
        self.with_state(|state| {
            state.content = Some(content);
            Ok(())
        })
    }

    /// 取走消息体，之后请求不再持有消息体。
    pub fn take_content(&self) -> Result<Option<Content>, Exception> {
        self.with_state(|state| Ok(state.content.take()))
    }

    pub fn set_property<T>(&self, key: &str, value: Arc<T>) -> Result<(), Exception>
    where
        T: Any + Send + Sync,
    {
        self.with_state(|state| {
            state.properties.insert(key.to_string(), value);
            Ok(())
        })
    }

    /// 按类型读取属性，键不存在或类型不符时返回 `None`。
    pub fn property<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let state = lock_or_recover(&self.state, "PipelineRequest");
        state
            .properties
            .get(key)
            .cloned()
            .and_then(|p| p.downcast::<T>().ok())
    }

    pub fn register_for_dispose(&self, resource: Box<dyn Disposable>) -> Result<(), Exception> {
        self.with_state(|state| {
            state.resources.push(resource);
            Ok(())
        })
    }

    /// 按注册顺序释放请求范围内的资源，每个资源只释放一次。
    pub fn dispose_request_resources(&self) {
        let resources: Vec<Box<dyn Disposable>> = {
            let mut state = lock_or_recover(&self.state, "PipelineRequest");
            state.resources.drain(..).collect()
        };
        for mut resource in resources {
            resource.dispose();
        }
    }

    /// 释放请求；重复调用无副作用。
    pub fn dispose(&self) {
        let mut state = lock_or_recover(&self.state, "PipelineRequest");
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.content = None;
        state.properties.clear();
    }

    pub fn is_disposed(&self) -> bool {
        lock_or_recover(&self.state, "PipelineRequest").disposed
    }
}

impl fmt::Debug for PipelineRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock_or_recover(&self.state, "PipelineRequest");
        f.debug_struct("PipelineRequest")
            .field("method", &state.method)
            .field("uri", &state.uri)
            .field("headers", &state.headers)
            .field("content", &state.content)
            .field("disposed", &state.disposed)
            .finish()
    }
}

struct ResponseState {
    status_code: u16,
    reason_phrase: Option<String>,
    headers: HeaderMap,
    content: Option<Content>,
    disposed: bool,
}

/// 管道侧的响应消息
#[derive(Clone)]
pub struct PipelineResponse {
    state: Arc<Mutex<ResponseState>>,
}

impl PipelineResponse {
    pub fn new(status_code: u16) -> Self {
        Self {
            state: Arc::new(Mutex::new(ResponseState {
                status_code,
                reason_phrase: None,
                headers: HeaderMap::new(HeaderClass::General),
                content: None,
                disposed: false,
            })),
        }
    }

    /// 带文本消息体的响应
    pub fn with_text(status_code: u16, text: impl Into<String>, media_type: &str) -> Self {
        let response = Self::new(status_code);
        // 新建的响应尚未释放
        let set = response.set_content(Content::from_text(text, media_type));
        debug_assert!(set.is_ok());
        response
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ResponseState) -> Result<R, Exception>) -> Result<R, Exception> {
        let mut state = lock_or_recover(&self.state, "PipelineResponse");
        if state.disposed {
            return Err(Exception::Disposed("PipelineResponse"));
        }
        f(&mut state)
    }

    pub fn status_code(&self) -> u16 {
        lock_or_recover(&self.state, "PipelineResponse").status_code
    }

    /// 原因短语；未显式设置时使用状态码的标准短语。
    pub fn reason_phrase(&self) -> String {
        let state = lock_or_recover(&self.state, "PipelineResponse");
        match &state.reason_phrase {
            Some(reason) => reason.clone(),
            None => reason_phrase(state.status_code).to_string(),
        }
    }

    pub fn set_status_code(&self, status_code: u16) -> Result<(), Exception> {
        self.with_state(|state| {
            state.status_code = status_code;
            Ok(())
        })
    }

    pub fn set_reason_phrase(&self, reason: impl Into<String>) -> Result<(), Exception> {
        let reason = reason.into();
        self.with_state(|state| {
            state.reason_phrase = Some(reason);
            Ok(())
        })
    }

    pub fn headers(&self) -> HeaderMap {
        lock_or_recover(&self.state, "PipelineResponse").headers.clone()
    }

    pub fn try_add_header(&self, name: &str, value: &str) -> Result<(), Exception> {
        self.with_state(|state| state.headers.try_add(name, value))
    }

    pub fn set_content(&self, content: Content) -> Result<(), Exception> {
        self.with_state(|state| {
            state.content = Some(content);
            Ok(())
        })
    }

    pub fn has_content(&self) -> bool {
        lock_or_recover(&self.state, "PipelineResponse").content.is_some()
    }

    pub fn take_content(&self) -> Result<Option<Content>, Exception> {
        self.with_state(|state| Ok(state.content.take()))
    }

    /// 释放响应；重复调用无副作用。
    pub fn dispose(&self) {
        let mut state = lock_or_recover(&self.state, "PipelineResponse");
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.content = None;
    }

    pub fn is_disposed(&self) -> bool {
        lock_or_recover(&self.state, "PipelineResponse").disposed
    }
}

impl fmt::Debug for PipelineResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock_or_recover(&self.state, "PipelineResponse");
        f.debug_struct("PipelineResponse")
            .field("status_code", &state.status_code)
            .field("reason_phrase", &state.reason_phrase)
            .field("headers", &state.headers)
            .field("content", &state.content)
            .field("disposed", &state.disposed)
            .finish()
    }
}

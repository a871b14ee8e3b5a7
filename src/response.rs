// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 宿主响应模块
//!
//! 内存中的宿主响应：记录桥接层写入的状态码、标头、缓存策略与输出字节，
//! 最终由 `as_bytes` 序列化为 HTTP/1.1 报文写回 Socket。

use chrono::prelude::*;
use log::debug;
use tokio::io::AsyncWrite;

use crate::{
    exception::Exception,
    host::{Cacheability, HostResponse},
    param::*,
    util::HtmlBuilder,
};

#[derive(Debug, Clone)]
pub struct Response {
    status_code: u16,
    information: String,
    headers: Vec<(String, String)>,
    cacheability: Cacheability,
    buffer_output: bool,
    skip_custom_errors: bool,
    date: DateTime<Utc>,
    server_name: String,
    body: Vec<u8>,
}

impl Response {
    /// 宿主默认：200 OK、允许客户端缓存、启用输出缓冲
    pub fn new() -> Self {
        Self {
            status_code: 200,
            information: "OK".to_string(),
            headers: Vec::new(),
            cacheability: Cacheability::Private,
            buffer_output: true,
            skip_custom_errors: false,
            date: Utc::now(),
            server_name: SERVER_NAME.to_string(),
            body: Vec::new(),
        }
    }

    /// 宿主直接生成的错误响应（例如请求无法解析时）
    pub fn from_status_code(code: u16) -> Self {
        let mut response = Self::new();
        response.set_status_code(code);
        response.set_reason_phrase(reason_phrase(code));
        response
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let substitute_error_page = self.status_code >= 400 && !self.skip_custom_errors;
        let body: Vec<u8> = if substitute_error_page {
            HtmlBuilder::from_status_code(self.status_code, None)
                .build()
                .into_bytes()
        } else {
            self.body.clone()
        };

        let mut header = format!(
            "HTTP/1.1 {} {}{}",
            self.status_code, self.information, CRLF
        );
        for (name, value) in &self.headers {
            // 替换为错误页时，原有的内容标头不再适用
            if substitute_error_page
                && (name.eq_ignore_ascii_case("content-type")
                    || name.eq_ignore_ascii_case("content-length"))
            {
                continue;
            }
            header.push_str(&[name.as_str(), ": ", value.as_str(), CRLF].concat());
        }
        if substitute_error_page {
            header.push_str(&["Content-Type: text/html;charset=utf-8", CRLF].concat());
        }
        if !self.has_header(CACHE_CONTROL) {
            header.push_str(&format!("{}: {}{}", CACHE_CONTROL, self.cacheability, CRLF));
        }
        // 未缓冲的输出由宿主流式写出，长度只在显式标头中给出
        if substitute_error_page || (self.buffer_output && !self.has_header("Content-Length")) {
            header.push_str(&format!("Content-Length: {}{}", body.len(), CRLF));
        }
        header.push_str(&format!("Date: {}{}", format_date(&self.date), CRLF));
        header.push_str(&format!("Server: {}{}", self.server_name, CRLF));
        header.push_str(CRLF);

        debug!(
            "宿主响应序列化完成，状态码: {}, 消息体: {} bytes, 缓冲: {}",
            self.status_code,
            body.len(),
            self.buffer_output
        );
        [header.as_bytes(), body.as_slice()].concat()
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    pub fn cacheability(&self) -> Cacheability {
        self.cacheability
    }

    pub fn buffer_output(&self) -> bool {
        self.buffer_output
    }

    pub fn skip_custom_errors(&self) -> bool {
        self.skip_custom_errors
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

impl HostResponse for Response {
    fn set_status_code(&mut self, code: u16) {
        self.status_code = code;
    }

    fn set_reason_phrase(&mut self, reason: &str) {
        self.information = reason.to_string();
    }

    fn append_header(&mut self, name: &str, value: &str) -> Result<(), Exception> {
        if value.contains('\r') || value.contains('\n') {
            return Err(Exception::InvalidHeaderValue(name.to_string()));
        }
        self.headers.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn set_cacheability(&mut self, cacheability: Cacheability) {
        self.cacheability = cacheability;
    }

    fn set_buffer_output(&mut self, buffer: bool) {
        self.buffer_output = buffer;
    }

    fn set_skip_custom_errors(&mut self, skip: bool) {
        self.skip_custom_errors = skip;
    }

    fn output_stream(&mut self) -> &mut (dyn AsyncWrite + Send + Unpin) {
        &mut self.body
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc2822()
}

// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 宿主请求模块
//!
//! 该模块把从 TCP 流中读取的原始字节解析为宿主原生的 `Request`，
//! 并为其实现 `HostRequest`，供桥接层转换为管道请求。它涵盖了：
//! 1. 请求行（Request-Line）的解析（方法、路径、版本）。
//! 2. 按原始顺序保留全部标头。
//! 3. 空行之后的请求体（遵循 `Content-Length` 截断）。

use std::io;

use bytes::Bytes;
use log::error;

use crate::{
    exception::Exception,
    host::{HostRequest, Principal},
    message::BodyStream,
    param::CRLF,
};

/// 表示一个完整的宿主 HTTP 请求。
#[derive(Debug, Clone)]
pub struct Request {
    /// 原始方法名（已转为大写）
    method: String,
    /// 请求的资源路径（包含查询字符串）
    path: String,
    /// HTTP 协议版本
    version: String,
    /// 按出现顺序排列的标头
    headers: Vec<(String, String)>,
    /// 请求体
    body: Bytes,
    /// 宿主认证模块设置的用户主体
    principal: Option<Principal>,
}

impl Request {
    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// # 逻辑步骤
    /// 1. 以空行切分头部与请求体，头部必须是合法的 UTF-8。
    /// 2. 解析请求行：提取方法、路径和协议版本。任何方法名都被接受。
    /// 3. 逐行解析标头，保留原始大小写与顺序。
    /// 4. 根据 `Content-Length` 截取请求体。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let (head, body) = match find_header_end(buffer) {
            Some(pos) => (&buffer[..pos], &buffer[pos + 4..]),
            None => (buffer, &buffer[buffer.len()..]),
        };

        let request_string = match std::str::from_utf8(head) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let request_lines: Vec<&str> = request_string.split(CRLF).collect();

        // 解析请求行 (e.g., "GET /index.html HTTP/1.1")
        let first_line_parts: Vec<&str> = request_lines[0].split(' ').collect();
        if first_line_parts.len() < 3 || first_line_parts[0].is_empty() {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_lines[0]);
            return Err(Exception::MalformedRequestLine);
        }

        let method = first_line_parts[0].to_uppercase();

        let version = first_line_parts[first_line_parts.len() - 1].to_uppercase();
        if version != "HTTP/1.1" && version != "HTTP/1.0" {
            error!("[ID{}]不支持的HTTP协议版本：{}", id, &version);
            return Err(Exception::UnsupportedHttpVersion);
        }

        // 考虑到路径中可能包含空格的情况，虽然不规范但通过 join 尝试恢复
        let path = first_line_parts[1..first_line_parts.len() - 1].join(" ");

        let mut headers = Vec::new();
        for line in request_lines.iter().skip(1) {
            if line.is_empty() {
                continue;
            }
            match line.split_once(':') {
                Some((name, value)) => {
                    headers.push((name.trim().to_string(), value.trim().to_string()))
                }
                None => error!("[ID{}]忽略无法解析的标头行：{}", id, line),
            }
        }

        let content_length = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.parse::<usize>().ok());
        let body = match content_length {
            Some(len) if len < body.len() => &body[..len],
            _ => body,
        };

        Ok(Self {
            method,
            path,
            version,
            headers,
            body: Bytes::copy_from_slice(body),
            principal: None,
        })
    }

    /// 由宿主认证模块附加用户主体
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}

// --- Getter 访问器实现 ---

impl Request {
    /// 获取 HTTP 协议版本
    pub fn version(&self) -> &str {
        &self.version
    }

    /// 获取请求路径（含查询参数）
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 获取某个标头的第一个值
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 获取用户代理字符串
    pub fn user_agent(&self) -> &str {
        self.header("User-Agent").unwrap_or("")
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

impl HostRequest for Request {
    fn method(&self) -> &str {
        &self.method
    }

    fn url(&self) -> &str {
        &self.path
    }

    fn headers(&self) -> Vec<(String, String)> {
        self.headers.clone()
    }

    fn input_stream(&self) -> Result<BodyStream, Exception> {
        Ok(Box::new(io::Cursor::new(self.body.clone())))
    }

    fn principal(&self) -> Option<Principal> {
        self.principal.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 验证常规 GET 请求的解析，包括 Path 和 Headers
    #[test]
    fn test_parse_get_request() {
        let request_str = "GET / HTTP/1.1\r\nHost: localhost:7878\r\nUser-Agent: Test-Browser\r\nAccept-Encoding: gzip, deflate, br\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(HostRequest::method(&request), "GET");
        assert_eq!(request.path(), "/");
        assert_eq!(request.user_agent(), "Test-Browser");
        assert_eq!(request.header("accept-encoding"), Some("gzip, deflate, br"));
        assert_eq!(HostRequest::headers(&request).len(), 3);
    }

    /// 任意方法名都被接受，交由管道决定如何处理
    #[test]
    fn test_unknown_method_accepted() {
        let request_str = "PROPFIND /resource HTTP/1.1\r\nHost: localhost:7878\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert_eq!(HostRequest::method(&request), "PROPFIND");
    }

    /// 验证请求方法的小写兼容性处理
    #[test]
    fn test_lowercase_method() {
        let request_str = "get / HTTP/1.1\r\nHost: localhost:7878\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert_eq!(HostRequest::method(&request), "GET");
    }

    /// 请求体按 Content-Length 截取
    #[test]
    fn test_parse_post_body() {
        let request_str =
            "POST /submit HTTP/1.1\r\nHost: localhost:7878\r\nContent-Length: 10\r\n\r\ntest=value\0\0\0";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.path(), "/submit");
        assert_eq!(request.body().as_ref(), b"test=value");
    }

    /// 确保不支持的版本（如 HTTP/2.0）被正确拒绝
    #[test]
    fn test_unsupported_http_version() {
        let request_str = "GET / HTTP/2.0\r\nHost: localhost:7878\r\n\r\n";
        let result = Request::try_from(request_str.as_bytes(), 0);
        match result {
            Err(Exception::UnsupportedHttpVersion) => {}
            other => panic!("Expected UnsupportedHttpVersion error, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_request_line() {
        let result = Request::try_from(b"GET\r\n\r\n", 0);
        assert!(matches!(result, Err(Exception::MalformedRequestLine)));
    }

    /// 验证 UTF-8 编码检查
    #[test]
    fn test_invalid_utf8() {
        let buffer = vec![0xFF, 0xFE, 0xFD];
        let result = Request::try_from(&buffer, 0);
        assert!(matches!(result, Err(Exception::RequestIsNotUtf8)));
    }

    /// 确保带查询参数的路径能完整提取
    #[test]
    fn test_path_with_query_string() {
        let request_str = "GET /page?id=123&name=test HTTP/1.1\r\nHost: localhost:7878\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert_eq!(HostRequest::url(&request), "/page?id=123&name=test");
    }

    #[test]
    fn test_principal_attached() {
        let request = Request::try_from(b"GET / HTTP/1.1\r\n\r\n", 0)
            .unwrap()
            .with_principal(Principal {
                name: "alice".to_string(),
                authentication_type: "Basic".to_string(),
            });
        assert_eq!(request.principal().map(|p| p.name), Some("alice".to_string()));
    }
}

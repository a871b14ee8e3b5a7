// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use log::{error, warn};
use serde_derive::{Deserialize, Serialize};

use std::fs::File;
use std::io::prelude::*;

use crate::{adapter::DEFAULT_COPY_BUFFER_SIZE, exception::Exception};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    port: u16,
    #[serde(default = "default_local")]
    local: bool,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_copy_buffer_size")]
    copy_buffer_size: usize,
    #[serde(default = "default_max_request_size")]
    max_request_size: usize,
    #[serde(default = "default_validator_cache_capacity")]
    validator_cache_capacity: usize,
    #[serde(default = "default_log_config")]
    log_config: String,
}

fn default_local() -> bool {
    true
}

fn default_copy_buffer_size() -> usize {
    DEFAULT_COPY_BUFFER_SIZE
}

fn default_max_request_size() -> usize {
    65536 // 64KB
}

fn default_validator_cache_capacity() -> usize {
    128
}

fn default_log_config() -> String {
    "config/log4rs.yaml".to_string()
}

impl Config {
    pub fn new() -> Self {
        Self {
            port: 7878,
            local: default_local(),
            worker_threads: 0,
            copy_buffer_size: default_copy_buffer_size(),
            max_request_size: default_max_request_size(),
            validator_cache_capacity: default_validator_cache_capacity(),
            log_config: default_log_config(),
        }
    }

    /// 从 TOML 文件读取配置。
    ///
    /// 文件无法读取时返回错误；内容无法解析时记录错误并使用默认配置。
    pub fn from_toml(filename: &str) -> Result<Self, Exception> {
        let mut file = File::open(filename)
            .map_err(|e| Exception::Config(format!("无法打开配置文件 {}: {}", filename, e)))?;
        let mut str_val = String::new();
        file.read_to_string(&mut str_val)
            .map_err(|e| Exception::Config(format!("无法读取配置文件 {}: {}", filename, e)))?;
        Ok(Self::from_toml_str(&str_val))
    }

    fn from_toml_str(str_val: &str) -> Self {
        let mut raw_config = match toml::from_str::<Config>(str_val) {
            Ok(t) => t,
            Err(e) => {
                error!("无法成功从配置文件构建配置对象，使用默认配置: {}", e);
                Config::new()
            }
        };
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        if raw_config.copy_buffer_size == 0 {
            warn!("copy_buffer_size被设置为0，将改为默认值{}", DEFAULT_COPY_BUFFER_SIZE);
            raw_config.copy_buffer_size = DEFAULT_COPY_BUFFER_SIZE;
        }
        raw_config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn copy_buffer_size(&self) -> usize {
        self.copy_buffer_size
    }

    pub fn max_request_size(&self) -> usize {
        self.max_request_size
    }

    pub fn validator_cache_capacity(&self) -> usize {
        self.validator_cache_capacity
    }

    pub fn log_config(&self) -> &str {
        &self.log_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_full_config() {
        let file = write_config(
            r#"
port = 8080
local = false
worker_threads = 3
copy_buffer_size = 4096
max_request_size = 1024
validator_cache_capacity = 16
log_config = "log.yaml"
"#,
        );
        let config = Config::from_toml(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.port(), 8080);
        assert!(!config.local());
        assert_eq!(config.worker_threads(), 3);
        assert_eq!(config.copy_buffer_size(), 4096);
        assert_eq!(config.max_request_size(), 1024);
        assert_eq!(config.validator_cache_capacity(), 16);
        assert_eq!(config.log_config(), "log.yaml");
    }

    #[test]
    fn test_defaults_fill_missing_keys() {
        let file = write_config("port = 9000\n");
        let config = Config::from_toml(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.port(), 9000);
        assert!(config.local());
        assert_eq!(config.worker_threads(), num_cpus::get());
        assert_eq!(config.copy_buffer_size(), DEFAULT_COPY_BUFFER_SIZE);
        assert_eq!(config.log_config(), "config/log4rs.yaml");
    }

    #[test]
    fn test_unparseable_falls_back_to_default() {
        let file = write_config("port = \"not a number\"");
        let config = Config::from_toml(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.port(), 7878);
        assert!(config.worker_threads() > 0);
    }

    #[test]
    fn test_zero_copy_buffer_replaced() {
        let file = write_config("port = 1\ncopy_buffer_size = 0\n");
        let config = Config::from_toml(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.copy_buffer_size(), DEFAULT_COPY_BUFFER_SIZE);
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let result = Config::from_toml(path.to_str().unwrap());
        assert!(matches!(result, Err(Exception::Config(_))));
    }
}

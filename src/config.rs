//! 配置模块，负责加载JSON配置文件
//!
//! ```json
//! {
//!   "cache": true,
//!   "attributes": {
//!     "Person": { "name": "full_name", "address.zipCode": "zip" }
//!   }
//! }
//! ```

use crate::normalizer::MappedNormalizer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error as ThisError;

/// 配置错误
#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("配置文件不存在: {}", .0.display())]
    NotFound(PathBuf),

    #[error("无法读取配置文件 {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("无法解析JSON配置: {0}")]
    Json(#[from] serde_json::Error),
}

/// 派生器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeriverConfig {
    /// 实体名 → (格式化后的属性路径 → 规范字段名)
    pub attributes: HashMap<String, HashMap<String, String>>,
    /// 是否缓存派生结果
    pub cache: bool,
}

impl Default for DeriverConfig {
    fn default() -> Self {
        Self {
            attributes: HashMap::new(),
            cache: true,
        }
    }
}

impl DeriverConfig {
    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();

        // 检查文件是否存在
        if !path_ref.exists() {
            return Err(ConfigError::NotFound(path_ref.to_path_buf()));
        }

        // 读取文件内容
        let content = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_ref.to_path_buf(),
            source,
        })?;

        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// 按配置映射属性的规范化器，未映射的属性原样返回
    pub fn normalizer(&self) -> MappedNormalizer {
        MappedNormalizer::new(self.attributes.clone())
    }
}

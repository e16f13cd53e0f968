use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::patch::{PatchWriter, DEFAULT_INDENT};
use crate::utils::BACKUP_SUFFIX;

/// 编辑器配置
///
/// 从 JSON 文件读取，缺失的键使用默认值。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// 编辑后是否自动保存
    pub autosave: bool,
    /// 自动保存延迟（毫秒）
    pub autosave_delay_ms: u64,
    /// 无法推断缩进时新字段使用的缩进
    pub default_indent: String,
    /// 备份文件后缀
    pub backup_suffix: String,
    /// 暂存编辑时是否检查取值
    pub validate_values: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            autosave: true,
            autosave_delay_ms: 1000,
            default_indent: DEFAULT_INDENT.to_string(),
            backup_suffix: BACKUP_SUFFIX.to_string(),
            validate_values: true,
        }
    }
}

impl EditorConfig {
    /// 从 JSON 文件加载
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件 {:?}", path))?;
        let config: EditorConfig = serde_json::from_str(&text)
            .with_context(|| format!("配置文件格式错误 {:?}", path))?;
        if config.backup_suffix.is_empty() {
            anyhow::bail!("backup_suffix 不能为空");
        }
        Ok(config)
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    pub fn patch_writer(&self) -> PatchWriter {
        PatchWriter::new(&self.default_indent)
    }
}

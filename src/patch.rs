//! 保留格式的补丁写入
//!
//! 只替换被编辑字段所在的字节区间，文件其余部分（注释、空白、属性顺序、
//! 手工排版）逐字节保留。记录的位置来自对原始字节的重新扫描。

use std::collections::BTreeMap;

use log::{debug, info};

use crate::inventory::parser;
use crate::record::RecordKey;
use crate::utils::{detect_line_ending, PatchError};

mod block;
mod index;

use block::{BlockPatcher, Splice};
use index::RecordIndex;

/// 默认字段缩进
pub const DEFAULT_INDENT: &str = "            ";

/// 一个记录的待写字段（字段名 -> 新值，空值表示删除），保持编辑顺序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldEdits {
    entries: Vec<(String, String)>,
}

impl FieldEdits {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置字段新值，已存在时覆盖
    pub fn set(&mut self, field: &str, value: &str) {
        match self.entries.iter_mut().find(|(name, _)| name == field) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.entries.push((field.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }

    pub fn remove(&mut self, field: &str) -> Option<String> {
        let index = self.entries.iter().position(|(name, _)| name == field)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 全部待写修改
pub type ChangeSet = BTreeMap<RecordKey, FieldEdits>;

/// 补丁写入器
#[derive(Debug, Clone)]
pub struct PatchWriter {
    /// 无法从记录块推断缩进时使用
    pub default_indent: String,
}

impl Default for PatchWriter {
    fn default() -> Self {
        Self {
            default_indent: DEFAULT_INDENT.to_string(),
        }
    }
}

impl PatchWriter {
    pub fn new(default_indent: &str) -> Self {
        Self {
            default_indent: default_indent.to_string(),
        }
    }

    /// 对原始字节应用修改
    ///
    /// 任一记录失败时整体失败，不返回部分结果。
    pub fn apply(&self, original: &[u8], changes: &ChangeSet) -> Result<Vec<u8>, PatchError> {
        if changes.values().all(FieldEdits::is_empty) {
            return Ok(original.to_vec());
        }

        let scanned = parser::scan(original).map_err(|e| PatchError::Malformed {
            position: e.position,
            message: e.message,
        })?;
        let index = RecordIndex::build(&scanned);
        let eol = detect_line_ending(original);

        let mut splices = Vec::new();
        for (key, edits) in changes {
            if edits.is_empty() {
                continue;
            }
            let record = index.locate(key)?;
            debug!("补丁 {}: {} 个字段", key, edits.len());
            let patcher = BlockPatcher::new(original, record, eol, &self.default_indent);
            splices.extend(patcher.splices(edits)?);
        }

        let patched = splice_all(original, splices)?;
        info!(
            "补丁完成: {} 个记录, {} -> {} 字节",
            changes.len(),
            original.len(),
            patched.len()
        );
        Ok(patched)
    }
}

/// 使用默认设置打补丁
pub fn patch(original: &[u8], changes: &ChangeSet) -> Result<Vec<u8>, PatchError> {
    PatchWriter::default().apply(original, changes)
}

/// 按位置顺序拼接所有替换
fn splice_all(original: &[u8], mut splices: Vec<Splice>) -> Result<Vec<u8>, PatchError> {
    splices.sort_by_key(|s| (s.start, s.end));

    let mut output = Vec::with_capacity(original.len() + 256);
    let mut cursor = 0;
    for splice in &splices {
        if splice.start < cursor {
            return Err(PatchError::Malformed {
                position: splice.start as u64,
                message: "overlapping edits".to_string(),
            });
        }
        output.extend_from_slice(&original[cursor..splice.start]);
        output.extend_from_slice(splice.text.as_bytes());
        cursor = splice.end;
    }
    output.extend_from_slice(&original[cursor..]);
    Ok(output)
}

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::datatypes::EntityKind;
use crate::record::{NodeId, RecordKey};

/// 默认备份后缀
pub const BACKUP_SUFFIX: &str = ".bak";

/// 加载库存文件时的错误
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parse error at byte {position}: {message}")]
    Parse { position: u64, message: String },

    #[error("Not a SeisComP inventory: {0}")]
    Structural(String),
}

/// 生成补丁时的错误
///
/// 任何一条记录失败都会使整次保存失败，不会产生部分写入的文件。
#[derive(Error, Debug)]
pub enum PatchError {
    #[error("Record {0} not found in original file")]
    KeyNotFound(RecordKey),

    #[error("Record {0} is not unique in original file")]
    DuplicateKey(RecordKey),

    #[error("Field '{field}' cannot be written on {kind}")]
    UnwritableField { kind: EntityKind, field: String },

    #[error("Original file is not well-formed at byte {position}: {message}")]
    Malformed { position: u64, message: String },
}

/// 保存流程中的错误
#[derive(Error, Debug)]
pub enum SaveError {
    #[error("No document loaded")]
    NoDocument,

    #[error("Cannot create backup {path:?}: {source}")]
    BackupFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot read backup: {source}")]
    ReadFailed { source: std::io::Error },

    #[error("Patch failed: {0}")]
    Patch(#[from] PatchError),

    #[error("Cannot write patched file: {source}")]
    WriteFailed { source: std::io::Error },

    /// 保存失败且备份无法还原，原文件只存在于备份路径
    #[error("{cause}; restoring backup {backup:?} also failed: {source}")]
    RestoreFailed {
        cause: Box<SaveError>,
        backup: PathBuf,
        source: std::io::Error,
    },
}

/// 编辑操作的错误
#[derive(Error, Debug, PartialEq, Eq)]
pub enum EditError {
    #[error("No document loaded")]
    NoDocument,

    #[error("No record selected")]
    NoActiveRecord,

    #[error("Handle {0:?} does not belong to the current document")]
    StaleHandle(NodeId),

    #[error("{kind} has no field '{field}'")]
    UnknownField { kind: EntityKind, field: String },

    #[error("Field '{field}' of {kind} is read-only")]
    ReadOnlyField { kind: EntityKind, field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,
}

/// 记录选择器错误
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SelectorError {
    #[error("Invalid selector '{0}'")]
    Invalid(String),

    #[error("No record matches '{0}'")]
    NotFound(String),
}

/// 计算备份文件路径：在完整文件名后追加后缀
///
/// `inventory.xml` -> `inventory.xml.bak`
pub fn backup_path_for(file_path: &Path, suffix: &str) -> PathBuf {
    let mut name = file_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    file_path.with_file_name(name)
}

/// 检测文本使用的换行符
pub fn detect_line_ending(bytes: &[u8]) -> &'static str {
    match bytes.iter().position(|&b| b == b'\n') {
        Some(pos) if pos > 0 && bytes[pos - 1] == b'\r' => "\r\n",
        _ => "\n",
    }
}

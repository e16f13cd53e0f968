/// 字段变更追踪模块
///
/// 记录每一次暂存的字段修改（修改前后值），支持撤销/重做，
/// 并在保存时合并为按记录分组的待写修改集。

use std::time::Instant;

use crate::patch::{ChangeSet, FieldEdits};
use crate::record::{NodeId, RecordKey};
use crate::utils::EditError;

/// 字段变更追踪器
///
/// # 实现细节
/// - 使用两个栈实现撤销/重做：undo_stack 和 redo_stack
/// - 所有变更按时间顺序存储在 changes 向量中
/// - 栈中存储的是索引而非实际数据
/// - 保存成功后整体清空
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    /// 所有变更的完整记录
    changes: Vec<FieldChange>,
    /// 撤销栈（存储 changes 中的索引）
    undo_stack: Vec<usize>,
    /// 重做栈（存储 changes 中的索引）
    redo_stack: Vec<usize>,
}

/// 单个字段的变更
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    /// 记录在原始文件中的标识
    pub record_key: RecordKey,
    /// 记录在当前文档中的句柄
    pub node: NodeId,
    /// 字段名
    pub field: String,
    /// 修改前的值
    pub old_value: String,
    /// 修改后的值（空串表示删除）
    pub new_value: String,
    /// 暂存时间
    pub applied_at: Instant,
}

impl FieldChange {
    pub fn new(record_key: RecordKey, node: NodeId, field: &str, old_value: &str, new_value: &str) -> Self {
        Self {
            record_key,
            node,
            field: field.to_string(),
            old_value: old_value.to_string(),
            new_value: new_value.to_string(),
            applied_at: Instant::now(),
        }
    }
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加一个变更，并清空重做栈
    pub fn add_change(&mut self, change: FieldChange) {
        let index = self.changes.len();
        self.changes.push(change);
        self.undo_stack.push(index);
        self.redo_stack.clear();
    }

    /// 撤销最后一次变更
    pub fn undo(&mut self) -> Result<&FieldChange, EditError> {
        let index = self.undo_stack.pop().ok_or(EditError::NothingToUndo)?;
        self.redo_stack.push(index);
        Ok(&self.changes[index])
    }

    /// 重做最后一次撤销的变更
    pub fn redo(&mut self) -> Result<&FieldChange, EditError> {
        let index = self.redo_stack.pop().ok_or(EditError::NothingToRedo)?;
        self.undo_stack.push(index);
        Ok(&self.changes[index])
    }

    /// 当前有效变更数量（撤销栈大小）
    pub fn len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo_stack.is_empty()
    }

    /// 按暂存顺序遍历有效变更
    pub fn iter(&self) -> impl Iterator<Item = &FieldChange> {
        self.undo_stack.iter().map(|&idx| &self.changes[idx])
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// 清空所有变更
    pub fn clear(&mut self) {
        self.changes.clear();
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// 特定记录的有效变更
    pub fn changes_for_record(&self, record_key: &RecordKey) -> Vec<&FieldChange> {
        self.iter()
            .filter(|change| &change.record_key == record_key)
            .collect()
    }

    /// 合并为待写修改集
    ///
    /// 同一字段多次修改只保留最终值；最终值等于最初值的字段不写入。
    pub fn pending(&self) -> ChangeSet {
        let mut first_old: Vec<(&RecordKey, &str, &str)> = Vec::new();
        let mut changes = ChangeSet::new();

        for change in self.iter() {
            let seen = first_old
                .iter()
                .any(|(key, field, _)| *key == &change.record_key && *field == change.field);
            if !seen {
                first_old.push((&change.record_key, change.field.as_str(), change.old_value.as_str()));
            }
            changes
                .entry(change.record_key.clone())
                .or_insert_with(FieldEdits::new)
                .set(&change.field, &change.new_value);
        }

        for (key, field, old_value) in first_old {
            if let Some(edits) = changes.get_mut(key) {
                if edits.get(field) == Some(old_value) {
                    edits.remove(field);
                }
            }
        }
        changes.retain(|_, edits| !edits.is_empty());
        changes
    }

    /// 是否存在需要写入的修改
    pub fn has_pending(&self) -> bool {
        !self.pending().is_empty()
    }

    /// 生成变更摘要
    pub fn summary(&self) -> String {
        format!(
            "变更总数: {}, 有效变更: {}, 待写记录: {}, 可撤销: {}, 可重做: {}",
            self.changes.len(),
            self.undo_stack.len(),
            self.pending().len(),
            self.can_undo(),
            self.can_redo()
        )
    }
}

/// 按字符截断显示
fn truncate(value: &str) -> String {
    match value.char_indices().nth(30) {
        Some((pos, _)) => format!("{}...", &value[..pos]),
        None => value.to_string(),
    }
}

impl std::fmt::Display for FieldChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}: \"{}\" -> \"{}\"",
            self.record_key,
            self.field,
            truncate(&self.old_value),
            truncate(&self.new_value)
        )
    }
}

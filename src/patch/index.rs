use std::collections::HashMap;

use crate::inventory::parser::{ScannedDocument, ScannedRecord};
use crate::record::RecordKey;
use crate::utils::PatchError;

/// 原始文件中记录标识到扫描下标的索引
pub(crate) struct RecordIndex<'a> {
    doc: &'a ScannedDocument,
    by_key: HashMap<RecordKey, Vec<usize>>,
}

/// 计算扫描记录的标识：优先 publicID，否则序号路径
pub(crate) fn scanned_key(record: &ScannedRecord) -> RecordKey {
    match record.attribute("publicID").filter(|id| !id.is_empty()) {
        Some(id) => RecordKey::public_id(record.kind, id),
        None => RecordKey::path(record.kind, record.path.clone()),
    }
}

impl<'a> RecordIndex<'a> {
    pub fn build(doc: &'a ScannedDocument) -> Self {
        let mut by_key: HashMap<RecordKey, Vec<usize>> = HashMap::new();
        for (index, record) in doc.records.iter().enumerate() {
            by_key.entry(scanned_key(record)).or_default().push(index);
        }
        Self { doc, by_key }
    }

    /// 查找唯一匹配的记录
    pub fn locate(&self, key: &RecordKey) -> Result<&'a ScannedRecord, PatchError> {
        match self.by_key.get(key).map(Vec::as_slice) {
            None | Some([]) => Err(PatchError::KeyNotFound(key.clone())),
            Some([index]) => Ok(&self.doc.records[*index]),
            Some(_) => Err(PatchError::DuplicateKey(key.clone())),
        }
    }
}

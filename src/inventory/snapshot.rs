use serde::{Deserialize, Serialize};

use super::Inventory;
use crate::datatypes::{EntityKind, FieldStorage};
use crate::record::NodeId;

/// 记录的只读快照，用于导出 JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSnapshot {
    pub kind: EntityKind,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_id: Option<String>,
    /// 字段表中的全部字段（包括空值与派生值）
    pub fields: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RecordSnapshot>,
}

impl Inventory {
    /// 生成单个记录及其子树的快照
    pub fn snapshot(&self, id: NodeId) -> Option<RecordSnapshot> {
        let record = self.get(id)?;
        let fields = record
            .kind
            .fields()
            .iter()
            .filter(|spec| spec.storage != FieldStorage::Key)
            .map(|spec| {
                let value = self.read_field(id, spec.name).unwrap_or_default();
                (spec.name.to_string(), value)
            })
            .collect();

        let children = self
            .children(Some(id))
            .unwrap_or_default()
            .into_iter()
            .filter_map(|child| self.snapshot(child))
            .collect();

        Some(RecordSnapshot {
            kind: record.kind,
            label: record.label(),
            public_id: record.public_id().map(str::to_string),
            fields,
            children,
        })
    }

    /// 整个文档的快照（网络、传感器、数据采集器）
    pub fn export_snapshots(&self) -> Vec<RecordSnapshot> {
        self.children(None)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|id| self.snapshot(id))
            .collect()
    }

    /// 导出为 JSON 字符串
    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.export_snapshots())
    }
}

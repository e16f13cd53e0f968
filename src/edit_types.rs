use serde::{Deserialize, Serialize};

/// 批量编辑文件中的一条修改
///
/// 用于 `--apply-edits`：
///
/// ```json
/// [
///   { "record": "GE.APE..BHZ", "field": "gainUnit", "value": "M/S" },
///   { "record": "sensor:STS-2", "field": "model", "value": "" }
/// ]
/// ```
///
/// `value` 为空串表示删除该字段。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEdit {
    /// 记录选择器
    pub record: String,
    /// 字段名
    pub field: String,
    /// 新值
    #[serde(default)]
    pub value: String,
}

impl FieldEdit {
    pub fn new(record: &str, field: &str, value: &str) -> Self {
        Self {
            record: record.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    /// 解析 `FIELD=VALUE` 形式的命令行参数
    pub fn parse_assignment(record: &str, assignment: &str) -> Option<Self> {
        let (field, value) = assignment.split_once('=')?;
        let field = field.trim();
        if field.is_empty() {
            return None;
        }
        Some(Self::new(record, field, value))
    }

    /// 从 JSON 文本读取修改列表
    pub fn list_from_json(text: &str) -> serde_json::Result<Vec<FieldEdit>> {
        serde_json::from_str(text)
    }
}

use crate::datatypes::EntityKind;
use crate::field::{Field, Span};

/// 文档中记录的句柄
///
/// 句柄只在产生它的文档内有效，重新加载文件后旧句柄全部失效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// 记录在原始文件中的定位方式
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Anchor {
    /// `publicID` 属性值
    PublicId(String),
    /// 从 `Inventory` 开始、每层在同类兄弟中的序号
    Path(Vec<usize>),
}

/// 变更追踪与补丁使用的记录标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub kind: EntityKind,
    pub anchor: Anchor,
}

impl RecordKey {
    pub fn public_id(kind: EntityKind, id: &str) -> Self {
        Self {
            kind,
            anchor: Anchor::PublicId(id.to_string()),
        }
    }

    pub fn path(kind: EntityKind, path: Vec<usize>) -> Self {
        Self {
            kind,
            anchor: Anchor::Path(path),
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.anchor {
            Anchor::PublicId(id) => write!(f, "{} publicID=\"{}\"", self.kind, id),
            Anchor::Path(path) => {
                let parts: Vec<String> = path.iter().map(|i| format!("#{}", i)).collect();
                write!(f, "{} {}", self.kind, parts.join("/"))
            }
        }
    }
}

/// 库存记录（network / station / sensorLocation / stream / sensor / datalogger）
#[derive(Debug, Clone)]
pub struct Record {
    /// 记录类型
    pub kind: EntityKind,
    /// 属性列表（保持文件中的顺序）
    pub attributes: Vec<(String, String)>,
    /// 文本字段
    pub fields: Vec<Field>,
    /// 子记录（仅层级中的下一级）
    pub children: Vec<NodeId>,
    /// 父记录，顶层记录为 None
    pub parent: Option<NodeId>,
    /// 同类兄弟序号路径
    pub path: Vec<usize>,
    /// 整个元素在加载时文件中的位置
    pub span: Span,
}

impl Record {
    /// 读取属性
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// 设置属性，已存在时原位替换
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    /// 移除属性，返回是否存在
    pub fn remove_attribute(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|(key, _)| key != name);
        before != self.attributes.len()
    }

    /// 读取文本字段
    pub fn field_text(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.name == name)
            .map(|field| field.text.as_str())
    }

    /// 设置文本字段，不存在时追加
    pub fn set_field(&mut self, name: &str, value: &str) {
        match self.fields.iter_mut().find(|field| field.name == name) {
            Some(field) => field.text = value.to_string(),
            None => self.fields.push(Field::new(name, value)),
        }
    }

    /// 移除文本字段，返回是否存在
    pub fn remove_field(&mut self, name: &str) -> bool {
        match self.fields.iter().position(|field| field.name == name) {
            Some(index) => {
                self.fields.remove(index);
                true
            }
            None => false,
        }
    }

    /// `publicID` 属性
    pub fn public_id(&self) -> Option<&str> {
        self.attribute("publicID").filter(|id| !id.is_empty())
    }

    /// 标识属性（code 或 name），缺失时为空串
    pub fn identity(&self) -> &str {
        self.attribute(self.kind.identity_attribute()).unwrap_or("")
    }

    /// 记录标识：优先使用 publicID，否则使用序号路径
    pub fn record_key(&self) -> RecordKey {
        match self.public_id() {
            Some(id) => RecordKey::public_id(self.kind, id),
            None => RecordKey::path(self.kind, self.path.clone()),
        }
    }

    /// 树视图标签，例如 `Stream: BHZ`
    pub fn label(&self) -> String {
        format!("{}: {}", self.kind.label_prefix(), self.identity())
    }
}

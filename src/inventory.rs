use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::channel_order::order_by_channel;
use crate::datatypes::{EntityKind, FieldSpec, FieldStorage};
use crate::io::{DefaultInventoryReader, InventoryReader};
use crate::record::{NodeId, Record, RecordKey};
use crate::utils::{EditError, LoadError};

pub(crate) mod parser;
mod snapshot;
mod stats;

pub use snapshot::RecordSnapshot;
pub use stats::InventoryStats;

/// SeisComP 命名空间的公共前缀（`seiscomp3-schema` 与 `seiscomp-schema` 均以此开头）
pub const SEISCOMP_NAMESPACE_PREFIX: &str = "http://geofon.gfz-potsdam.de/ns/seiscomp";

/// 内存中的库存文档
///
/// 记录保存在一个扁平数组中，通过 [`NodeId`] 访问。层级关系
/// Network → Station → SensorLocation → Stream 由 `children`/`parent` 维护。
#[derive(Debug, Clone)]
pub struct Inventory {
    /// 来源文件路径（从内存加载时为 None）
    pub path: Option<PathBuf>,
    /// 根元素命名空间
    pub namespace: String,
    records: Vec<Record>,
    top_level: Vec<NodeId>,
}

impl Inventory {
    /// 从文件加载
    pub fn load(path: PathBuf) -> Result<Self, LoadError> {
        Self::load_with_reader(&path, &DefaultInventoryReader)
    }

    /// 使用自定义 Reader 加载
    pub fn load_with_reader(path: &Path, reader: &dyn InventoryReader) -> Result<Self, LoadError> {
        let raw = reader.read(path)?;
        let mut inventory = Self::from_bytes(&raw.bytes)?;
        inventory.path = Some(path.to_path_buf());
        info!(
            "已加载库存 {:?}: {} 个记录",
            path,
            inventory.records.len()
        );
        Ok(inventory)
    }

    /// 从内存字节解析
    ///
    /// 先检查 XML 格式是否良好，再检查根元素与 `Inventory` 容器。
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoadError> {
        let scanned = parser::scan(bytes).map_err(|e| LoadError::Parse {
            position: e.position,
            message: e.message,
        })?;

        let namespace = Self::validate_structure(&scanned)?;

        let records = scanned
            .records
            .into_iter()
            .map(|r| Record {
                kind: r.kind,
                attributes: r.attributes,
                fields: r.fields,
                children: r.children.into_iter().map(NodeId).collect(),
                parent: r.parent.map(NodeId),
                path: r.path,
                span: r.span,
            })
            .collect();

        Ok(Inventory {
            path: None,
            namespace,
            records,
            top_level: scanned.top_level.into_iter().map(NodeId).collect(),
        })
    }

    /// 根元素必须是 SeisComP 命名空间下的 `seiscomp`，且包含 `Inventory`
    fn validate_structure(scanned: &parser::ScannedDocument) -> Result<String, LoadError> {
        let root = scanned.root_name.as_deref().unwrap_or("");
        if root != "seiscomp" {
            return Err(LoadError::Structural(format!(
                "root element is <{}>, expected <seiscomp>",
                root
            )));
        }

        let namespace = scanned.root_namespace.clone().unwrap_or_default();
        if !namespace.starts_with(SEISCOMP_NAMESPACE_PREFIX) {
            return Err(LoadError::Structural(format!(
                "root element is not in a SeisComP namespace: '{}'",
                namespace
            )));
        }

        if scanned.inventory_count == 0 {
            return Err(LoadError::Structural(
                "document has no <Inventory> element".to_string(),
            ));
        }

        Ok(namespace)
    }

    /// 获取记录
    pub fn get(&self, id: NodeId) -> Option<&Record> {
        self.records.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Record> {
        self.records.get_mut(id.0)
    }

    fn record(&self, id: NodeId) -> Result<&Record, EditError> {
        self.get(id).ok_or(EditError::StaleHandle(id))
    }

    /// 记录总数
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 按文件顺序遍历所有记录
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Record)> {
        self.records
            .iter()
            .enumerate()
            .map(|(index, record)| (NodeId(index), record))
    }

    fn top_level_of(&self, kind: EntityKind) -> Vec<NodeId> {
        self.top_level
            .iter()
            .copied()
            .filter(|&id| self.records[id.0].kind == kind)
            .collect()
    }

    fn children_of(&self, parent: NodeId, kind: EntityKind) -> Vec<NodeId> {
        match self.get(parent) {
            Some(record) if record.kind.child_kind() == Some(kind) => record.children.clone(),
            _ => Vec::new(),
        }
    }

    /// 所有网络
    pub fn networks(&self) -> Vec<NodeId> {
        self.top_level_of(EntityKind::Network)
    }

    /// 网络下的台站
    pub fn stations(&self, network: NodeId) -> Vec<NodeId> {
        self.children_of(network, EntityKind::Station)
    }

    /// 台站下的传感器位置
    pub fn sensor_locations(&self, station: NodeId) -> Vec<NodeId> {
        self.children_of(station, EntityKind::SensorLocation)
    }

    /// 位置下的通道（文件顺序，未排序）
    pub fn streams(&self, location: NodeId) -> Vec<NodeId> {
        self.children_of(location, EntityKind::Stream)
    }

    /// 位置下的通道（按通道命名约定排序）
    pub fn ordered_streams(&self, location: NodeId) -> Vec<NodeId> {
        let mut streams = self.streams(location);
        order_by_channel(&mut streams, |id| self.records[id.0].identity());
        streams
    }

    /// 传感器目录
    pub fn sensors(&self) -> Vec<NodeId> {
        self.top_level_of(EntityKind::Sensor)
    }

    /// 数据采集器目录
    pub fn dataloggers(&self) -> Vec<NodeId> {
        self.top_level_of(EntityKind::Datalogger)
    }

    /// 树视图中的子节点
    ///
    /// `None` 表示文档根：依次返回网络、传感器、数据采集器。
    /// 位置下的通道已按通道命名约定排序。
    pub fn children(&self, parent: Option<NodeId>) -> Result<Vec<NodeId>, EditError> {
        let parent = match parent {
            None => {
                let mut roots = self.networks();
                roots.extend(self.sensors());
                roots.extend(self.dataloggers());
                return Ok(roots);
            }
            Some(parent) => parent,
        };

        let record = self.record(parent)?;
        Ok(match record.kind {
            EntityKind::SensorLocation => self.ordered_streams(parent),
            _ => record.children.clone(),
        })
    }

    /// 按记录标识查找
    pub fn find_by_key(&self, key: &RecordKey) -> Option<NodeId> {
        self.iter()
            .find(|(_, record)| record.kind == key.kind && &record.record_key() == key)
            .map(|(id, _)| id)
    }

    /// 读取字段，缺失时返回空串
    pub fn read_field(&self, id: NodeId, field: &str) -> Result<String, EditError> {
        let record = self.record(id)?;
        let spec = Self::lookup_field(record, field)?;
        Ok(Self::read_spec(record, spec))
    }

    pub(crate) fn lookup_field(record: &Record, field: &str) -> Result<&'static FieldSpec, EditError> {
        record.kind.field(field).ok_or_else(|| EditError::UnknownField {
            kind: record.kind,
            field: field.to_string(),
        })
    }

    fn read_spec(record: &Record, spec: &FieldSpec) -> String {
        match spec.storage {
            FieldStorage::Attribute | FieldStorage::Key => {
                record.attribute(spec.name).unwrap_or("").to_string()
            }
            FieldStorage::Element => record.field_text(spec.name).unwrap_or("").to_string(),
            FieldStorage::Derived => derived_sample_rate(record),
        }
    }

    /// 将取值写入内存模型（不做变更追踪）
    ///
    /// 空值表示删除：属性被移除，字段元素被删除。
    pub(crate) fn apply_field(&mut self, id: NodeId, field: &str, value: &str) -> Result<(), EditError> {
        let record = self.get_mut(id).ok_or(EditError::StaleHandle(id))?;
        let spec = Self::lookup_field(record, field)?;
        match spec.storage {
            FieldStorage::Attribute => {
                if value.is_empty() {
                    record.remove_attribute(spec.name);
                } else {
                    record.set_attribute(spec.name, value);
                }
            }
            FieldStorage::Element => {
                if value.is_empty() {
                    record.remove_field(spec.name);
                } else {
                    record.set_field(spec.name, value);
                }
            }
            FieldStorage::Key | FieldStorage::Derived => {
                return Err(EditError::ReadOnlyField {
                    kind: record.kind,
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }

    /// 文件名（用于显示）
    pub fn get_name(&self) -> String {
        self.path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "<memory>".to_string())
    }
}

/// 由分子/分母计算采样率，保留一位小数
///
/// 分子缺失时显示为空；分母缺失按 1 处理；分母为 0 或数字无法解析时显示为空。
pub fn derived_sample_rate(record: &Record) -> String {
    let numerator = match record.field_text("sampleRateNumerator") {
        Some(text) if !text.trim().is_empty() => text.trim(),
        _ => return String::new(),
    };
    let denominator = record
        .field_text("sampleRateDenominator")
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .unwrap_or("1");

    match (numerator.parse::<f64>(), denominator.parse::<f64>()) {
        (Ok(n), Ok(d)) if d != 0.0 => format!("{:.1}", n / d),
        (Ok(_), Ok(_)) => String::new(),
        _ => {
            warn!(
                "无法计算采样率 {}: {}/{}",
                record.label(),
                numerator,
                denominator
            );
            String::new()
        }
    }
}

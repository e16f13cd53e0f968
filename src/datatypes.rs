use serde::{Deserialize, Serialize};

use crate::validate::FieldRule;

/// 库存记录的实体类型
///
/// 每种类型对应 XML 中的一个元素名，并带有固定的字段表。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Network,
    Station,
    SensorLocation,
    Stream,
    Sensor,
    Datalogger,
}

impl EntityKind {
    /// 所有实体类型
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Network,
        EntityKind::Station,
        EntityKind::SensorLocation,
        EntityKind::Stream,
        EntityKind::Sensor,
        EntityKind::Datalogger,
    ];

    /// 对应的 XML 元素名（不含命名空间前缀）
    pub fn element_name(&self) -> &'static str {
        match self {
            EntityKind::Network => "network",
            EntityKind::Station => "station",
            EntityKind::SensorLocation => "sensorLocation",
            EntityKind::Stream => "stream",
            EntityKind::Sensor => "sensor",
            EntityKind::Datalogger => "datalogger",
        }
    }

    /// 从元素本地名解析实体类型
    pub fn from_element_name(name: &[u8]) -> Option<Self> {
        match name {
            b"network" => Some(EntityKind::Network),
            b"station" => Some(EntityKind::Station),
            b"sensorLocation" => Some(EntityKind::SensorLocation),
            b"stream" => Some(EntityKind::Stream),
            b"sensor" => Some(EntityKind::Sensor),
            b"datalogger" => Some(EntityKind::Datalogger),
            _ => None,
        }
    }

    /// 可以出现在 `Inventory` 下的顶层类型
    pub fn is_top_level(&self) -> bool {
        matches!(
            self,
            EntityKind::Network | EntityKind::Sensor | EntityKind::Datalogger
        )
    }

    /// 层级中的子记录类型
    pub fn child_kind(&self) -> Option<EntityKind> {
        match self {
            EntityKind::Network => Some(EntityKind::Station),
            EntityKind::Station => Some(EntityKind::SensorLocation),
            EntityKind::SensorLocation => Some(EntityKind::Stream),
            EntityKind::Stream | EntityKind::Sensor | EntityKind::Datalogger => None,
        }
    }

    /// 树视图中的标签前缀
    pub fn label_prefix(&self) -> &'static str {
        match self {
            EntityKind::Network => "Network",
            EntityKind::Station => "Station",
            EntityKind::SensorLocation => "Location",
            EntityKind::Stream => "Stream",
            EntityKind::Sensor => "Sensor",
            EntityKind::Datalogger => "Datalogger",
        }
    }

    /// 在父记录内标识该记录的属性
    pub fn identity_attribute(&self) -> &'static str {
        match self {
            EntityKind::Sensor | EntityKind::Datalogger => "name",
            _ => "code",
        }
    }

    /// 该类型的完整字段表
    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            EntityKind::Network => NETWORK_FIELDS,
            EntityKind::Station => STATION_FIELDS,
            EntityKind::SensorLocation => SENSOR_LOCATION_FIELDS,
            EntityKind::Stream => STREAM_FIELDS,
            EntityKind::Sensor | EntityKind::Datalogger => EQUIPMENT_FIELDS,
        }
    }

    /// 按名称查找字段
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields().iter().find(|spec| spec.name == name)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.element_name())
    }
}

/// 字段的存储方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStorage {
    /// 元素属性（`code`、`name`），空值表示移除属性
    Attribute,
    /// 只读属性（`publicID`），作为补丁锚点
    Key,
    /// 子元素文本（`<gain>…</gain>`），空值表示删除元素
    Element,
    /// 由其他字段计算得到，不落盘
    Derived,
}

/// 字段定义
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// XML 中的名称
    pub name: &'static str,
    /// 显示名称
    pub label: &'static str,
    pub storage: FieldStorage,
    /// 校验规则
    pub rule: FieldRule,
}

impl FieldSpec {
    const fn new(name: &'static str, label: &'static str, storage: FieldStorage, rule: FieldRule) -> Self {
        Self {
            name,
            label,
            storage,
            rule,
        }
    }

    /// 是否允许编辑
    pub fn is_editable(&self) -> bool {
        matches!(self.storage, FieldStorage::Attribute | FieldStorage::Element)
    }
}

use crate::validate::FieldRule as R;
use self::FieldStorage as S;

const NETWORK_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("code", "Code", S::Attribute, R::Text),
    FieldSpec::new("start", "Start Time", S::Element, R::Time),
    FieldSpec::new("end", "End Time", S::Element, R::Time),
    FieldSpec::new("description", "Description", S::Element, R::Text),
    FieldSpec::new("institutions", "Institutions", S::Element, R::Text),
    FieldSpec::new("region", "Region", S::Element, R::Text),
    FieldSpec::new("type", "Type", S::Element, R::Text),
    FieldSpec::new("netClass", "Network Class", S::Element, R::Text),
    FieldSpec::new("archive", "Archive", S::Element, R::Text),
    FieldSpec::new("restricted", "Restricted", S::Element, R::Boolean),
    FieldSpec::new("shared", "Shared", S::Element, R::Boolean),
];

const STATION_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("code", "Code", S::Attribute, R::Text),
    FieldSpec::new("name", "Name", S::Attribute, R::Text),
    FieldSpec::new("description", "Description", S::Element, R::Text),
    FieldSpec::new("latitude", "Latitude", S::Element, R::Latitude),
    FieldSpec::new("longitude", "Longitude", S::Element, R::Longitude),
    FieldSpec::new("elevation", "Elevation", S::Element, R::Decimal),
];

const SENSOR_LOCATION_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("code", "Code", S::Attribute, R::Text),
    FieldSpec::new("start", "Start Time", S::Element, R::Time),
    FieldSpec::new("end", "End Time", S::Element, R::Time),
    FieldSpec::new("latitude", "Latitude", S::Element, R::Latitude),
    FieldSpec::new("longitude", "Longitude", S::Element, R::Longitude),
    FieldSpec::new("elevation", "Elevation", S::Element, R::Decimal),
    FieldSpec::new("country", "Country", S::Element, R::Text),
    FieldSpec::new("description", "Description", S::Element, R::Text),
    FieldSpec::new("affiliation", "Affiliation", S::Element, R::Text),
];

const STREAM_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("code", "Code", S::Attribute, R::Text),
    FieldSpec::new("publicID", "Public ID", S::Key, R::Text),
    FieldSpec::new("start", "Start Time", S::Element, R::Time),
    FieldSpec::new("end", "End Time", S::Element, R::Time),
    FieldSpec::new("depth", "Depth (m)", S::Element, R::Decimal),
    FieldSpec::new("azimuth", "Azimuth (°)", S::Element, R::Azimuth),
    FieldSpec::new("dip", "Dip (°)", S::Element, R::Dip),
    FieldSpec::new("gain", "Gain", S::Element, R::Decimal),
    FieldSpec::new("sampleRate", "Sample Rate (Hz)", S::Derived, R::NonNegativeDecimal),
    FieldSpec::new("sampleRateNumerator", "Sample Rate Numerator", S::Element, R::Count),
    FieldSpec::new("sampleRateDenominator", "Sample Rate Denominator", S::Element, R::Count),
    FieldSpec::new("gainFrequency", "Gain Frequency (Hz)", S::Element, R::NonNegativeDecimal),
    FieldSpec::new("gainUnit", "Gain Unit", S::Element, R::Text),
    FieldSpec::new("dataloggerSerialNumber", "Datalogger S/N", S::Element, R::Text),
    FieldSpec::new("sensorSerialNumber", "Sensor S/N", S::Element, R::Text),
    FieldSpec::new("flags", "Flags", S::Element, R::Text),
];

const EQUIPMENT_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("name", "Name", S::Attribute, R::Text),
    FieldSpec::new("type", "Type", S::Element, R::Text),
    FieldSpec::new("model", "Model", S::Element, R::Text),
    FieldSpec::new("manufacturer", "Manufacturer", S::Element, R::Text),
    FieldSpec::new("serialNumber", "Serial Number", S::Element, R::Text),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_name_roundtrip() {
        for kind in EntityKind::ALL {
            assert_eq!(
                EntityKind::from_element_name(kind.element_name().as_bytes()),
                Some(kind)
            );
        }
        assert_eq!(EntityKind::from_element_name(b"Inventory"), None);
    }

    #[test]
    fn test_hierarchy() {
        assert_eq!(EntityKind::Network.child_kind(), Some(EntityKind::Station));
        assert_eq!(EntityKind::SensorLocation.child_kind(), Some(EntityKind::Stream));
        assert_eq!(EntityKind::Stream.child_kind(), None);
        assert!(EntityKind::Sensor.is_top_level());
        assert!(!EntityKind::Station.is_top_level());
    }

    #[test]
    fn test_field_tables() {
        let stream = EntityKind::Stream;
        assert_eq!(stream.field("gainUnit").unwrap().storage, FieldStorage::Element);
        assert_eq!(stream.field("code").unwrap().storage, FieldStorage::Attribute);
        assert!(!stream.field("sampleRate").unwrap().is_editable());
        assert!(!stream.field("publicID").unwrap().is_editable());
        assert!(stream.field("latitude").is_none());

        assert_eq!(EntityKind::Sensor.identity_attribute(), "name");
        assert_eq!(EntityKind::Station.field("name").unwrap().storage, FieldStorage::Attribute);
    }
}

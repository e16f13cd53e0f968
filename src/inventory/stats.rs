use std::fmt;

use serde::Serialize;

use super::Inventory;
use crate::datatypes::EntityKind;

/// 库存统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryStats {
    pub networks: usize,
    pub stations: usize,
    pub sensor_locations: usize,
    pub streams: usize,
    pub sensors: usize,
    pub dataloggers: usize,
    /// 已填写的文本字段总数
    pub fields: usize,
}

impl Inventory {
    /// 统计各类记录数量
    pub fn get_stats(&self) -> InventoryStats {
        let mut stats = InventoryStats::default();
        for (_, record) in self.iter() {
            let counter = match record.kind {
                EntityKind::Network => &mut stats.networks,
                EntityKind::Station => &mut stats.stations,
                EntityKind::SensorLocation => &mut stats.sensor_locations,
                EntityKind::Stream => &mut stats.streams,
                EntityKind::Sensor => &mut stats.sensors,
                EntityKind::Datalogger => &mut stats.dataloggers,
            };
            *counter += 1;
            stats.fields += record.fields.len();
        }
        stats
    }
}

impl fmt::Display for InventoryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== 库存统计 ===")?;
        writeln!(f, "网络: {}", self.networks)?;
        writeln!(f, "台站: {}", self.stations)?;
        writeln!(f, "传感器位置: {}", self.sensor_locations)?;
        writeln!(f, "通道: {}", self.streams)?;
        writeln!(f, "传感器: {}", self.sensors)?;
        writeln!(f, "数据采集器: {}", self.dataloggers)?;
        write!(f, "字段: {}", self.fields)
    }
}

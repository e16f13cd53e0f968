/// 基于文件系统的默认读写实现
use std::io;
use std::path::Path;

use super::traits::{InventoryReader, InventoryWriter, RawInventoryData};

#[derive(Debug, Clone, Default)]
pub struct DefaultInventoryReader;

impl InventoryReader for DefaultInventoryReader {
    fn read(&self, path: &Path) -> io::Result<RawInventoryData> {
        Ok(RawInventoryData::new(std::fs::read(path)?))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DefaultInventoryWriter;

impl InventoryWriter for DefaultInventoryWriter {
    fn write(&self, data: &RawInventoryData, path: &Path) -> io::Result<()> {
        // 确保父目录存在
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, &data.bytes)
    }
}

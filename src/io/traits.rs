/// IO 抽象层 - trait 定义

use std::io;
use std::path::Path;

/// 库存文件原始数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInventoryData {
    /// 文件的原始字节
    pub bytes: Vec<u8>,
}

impl RawInventoryData {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

/// 库存文件读取 trait
///
/// 只负责 IO，不负责解析。
pub trait InventoryReader {
    fn read(&self, path: &Path) -> io::Result<RawInventoryData>;
}

/// 库存文件写入 trait
///
/// 只负责 IO，不负责生成补丁。
pub trait InventoryWriter {
    fn write(&self, data: &RawInventoryData, path: &Path) -> io::Result<()>;
}

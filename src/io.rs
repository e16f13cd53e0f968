/// IO 抽象层模块
///
/// 文件读写通过 trait 注入，保存流程可以在测试中替换为会失败的实现。
///
/// - **traits**: Reader/Writer trait 定义
/// - **inventory_io**: 基于文件系统的默认实现
pub mod inventory_io;
pub mod traits;

pub use inventory_io::{DefaultInventoryReader, DefaultInventoryWriter};
pub use traits::{InventoryReader, InventoryWriter, RawInventoryData};

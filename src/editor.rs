/// 编辑器层模块
///
/// 提供有状态的编辑接口：选中记录、暂存修改、撤销/重做、自动保存。
/// 遵循"修改-保存分离"原则，所有修改先进入内存，保存时才生成补丁写盘。
///
/// - **session**: 编辑会话，持有当前文档与选中的记录
/// - **delta**: 变更追踪，支持撤销/重做
/// - **autosave**: 自动保存的延迟触发器
///
/// ```rust,ignore
/// let mut session = EditingSession::default();
/// session.load_document(Path::new("inventory.xml"))?;
/// session.stage_field_change(stream, "gainUnit", "M/S")?;
/// session.save_to_original()?;
/// ```
pub mod autosave;
pub mod delta;
pub mod session;

pub use autosave::AutosaveTimer;
pub use delta::{ChangeTracker, FieldChange};
pub use session::{EditingSession, StageOutcome};

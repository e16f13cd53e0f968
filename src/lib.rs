pub mod backup;
pub mod channel_order;
pub mod config;
pub mod datatypes;
pub mod debug;
pub mod edit_types;
pub mod editor;
pub mod field;
pub mod inventory;
pub mod io;
pub mod patch;
pub mod record;
pub mod selector;
pub mod utils;
pub mod validate;

// 重新导出主要结构
pub use backup::{BackupCoordinator, SaveReport};
pub use channel_order::{channel_sort_key, order_codes, ChannelKey};
pub use config::EditorConfig;
pub use datatypes::{EntityKind, FieldSpec, FieldStorage};
pub use debug::InventoryDebugger;
pub use edit_types::FieldEdit;
pub use editor::{ChangeTracker, EditingSession, FieldChange, StageOutcome};
pub use field::{Field, Span};
pub use inventory::{Inventory, InventoryStats, RecordSnapshot, SEISCOMP_NAMESPACE_PREFIX};
pub use patch::{patch, ChangeSet, FieldEdits, PatchWriter};
pub use record::{Anchor, NodeId, Record, RecordKey};
pub use selector::RecordSelector;
pub use utils::{EditError, LoadError, PatchError, SaveError, SelectorError};
pub use validate::FieldRule;

// 常量定义
pub const SUPPORTED_EXTENSIONS: &[&str] = &["xml"];

/// 编辑会话
///
/// 持有当前文档、当前选中的记录、变更追踪器与自动保存计时器。
/// 所有命令都通过会话进行，修改先进入内存，显式保存（或自动保存到期）时才写盘。

use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, info, warn};

use super::autosave::AutosaveTimer;
use super::delta::{ChangeTracker, FieldChange};
use crate::backup::{BackupCoordinator, SaveReport};
use crate::config::EditorConfig;
use crate::inventory::Inventory;
use crate::record::{NodeId, Record};
use crate::utils::{EditError, LoadError, SaveError};

/// 暂存编辑的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// 新值与当前值相同，未记录
    Unchanged,
    /// 已更新内存模型并记录变更
    Staged,
}

/// 编辑会话
///
/// # 使用示例
///
/// ```rust,ignore
/// use scinv_editor::{EditingSession, EditorConfig};
///
/// let mut session = EditingSession::new(EditorConfig::default());
/// session.load_document(Path::new("inventory.xml"))?;
/// let network = session.list_children(None)?[0];
/// session.stage_field_change(network, "description", "GEOFON")?;
/// session.save_to_original()?;
/// ```
pub struct EditingSession {
    document: Option<Inventory>,
    active: Option<NodeId>,
    tracker: ChangeTracker,
    autosave: AutosaveTimer,
    coordinator: BackupCoordinator,
    config: EditorConfig,
}

impl Default for EditingSession {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl EditingSession {
    pub fn new(config: EditorConfig) -> Self {
        let coordinator = BackupCoordinator::default()
            .with_patcher(config.patch_writer())
            .with_suffix(&config.backup_suffix);
        Self::with_coordinator(config, coordinator)
    }

    /// 使用自定义的保存协调器（例如注入测试用的 Writer）
    pub fn with_coordinator(config: EditorConfig, coordinator: BackupCoordinator) -> Self {
        Self {
            document: None,
            active: None,
            tracker: ChangeTracker::new(),
            autosave: AutosaveTimer::new(config.autosave_delay()),
            coordinator,
            config,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// 加载文档；失败时保留之前的文档不变
    pub fn load_document(&mut self, path: &Path) -> Result<&Inventory, LoadError> {
        let inventory = Inventory::load(path.to_path_buf())?;
        if self.tracker.has_pending() {
            warn!("丢弃 {} 个未保存的修改", self.tracker.len());
        }
        info!("打开 {:?}", path);
        Ok(self.install(inventory))
    }

    /// 安装已解析的文档
    pub fn open(&mut self, inventory: Inventory) -> &Inventory {
        self.install(inventory)
    }

    fn install(&mut self, inventory: Inventory) -> &Inventory {
        self.active = None;
        self.tracker.clear();
        self.autosave.cancel();
        self.document.insert(inventory)
    }

    pub fn document(&self) -> Option<&Inventory> {
        self.document.as_ref()
    }

    fn doc(&self) -> Result<&Inventory, EditError> {
        self.document.as_ref().ok_or(EditError::NoDocument)
    }

    fn doc_mut(&mut self) -> Result<&mut Inventory, EditError> {
        self.document.as_mut().ok_or(EditError::NoDocument)
    }

    /// 关闭文档，丢弃未保存的修改
    pub fn close(&mut self) -> Option<Inventory> {
        self.active = None;
        self.tracker.clear();
        self.autosave.cancel();
        self.document.take()
    }

    /// 树视图中的子节点（通道已排序）
    pub fn list_children(&self, parent: Option<NodeId>) -> Result<Vec<NodeId>, EditError> {
        self.doc()?.children(parent)
    }

    pub fn record(&self, id: NodeId) -> Result<&Record, EditError> {
        self.doc()?.get(id).ok_or(EditError::StaleHandle(id))
    }

    /// 选中记录
    pub fn select(&mut self, id: NodeId) -> Result<&Record, EditError> {
        self.record(id)?;
        self.active = Some(id);
        self.record(id)
    }

    pub fn active_record(&self) -> Option<NodeId> {
        self.active
    }

    /// 读取字段，缺失时返回空串
    pub fn read_field(&self, id: NodeId, field: &str) -> Result<String, EditError> {
        self.doc()?.read_field(id, field)
    }

    /// 读取当前选中记录的字段
    pub fn read_active_field(&self, field: &str) -> Result<String, EditError> {
        let id = self.active.ok_or(EditError::NoActiveRecord)?;
        self.read_field(id, field)
    }

    /// 暂存字段修改
    ///
    /// 更新内存模型，并在取值确实变化时记录变更、重新开始自动保存计时。
    pub fn stage_field_change(
        &mut self,
        id: NodeId,
        field: &str,
        value: &str,
    ) -> Result<StageOutcome, EditError> {
        let doc = self.doc()?;
        let record = doc.get(id).ok_or(EditError::StaleHandle(id))?;
        let spec = Inventory::lookup_field(record, field)?;
        if !spec.is_editable() {
            return Err(EditError::ReadOnlyField {
                kind: record.kind,
                field: field.to_string(),
            });
        }
        if self.config.validate_values {
            spec.rule.check(value).map_err(|reason| EditError::InvalidValue {
                field: field.to_string(),
                reason,
            })?;
        }

        let current = doc.read_field(id, field)?;
        if current == value {
            return Ok(StageOutcome::Unchanged);
        }

        let change = FieldChange::new(record.record_key(), id, spec.name, &current, value);
        debug!("暂存 {}", change);
        self.doc_mut()?.apply_field(id, field, value)?;
        self.tracker.add_change(change);
        self.touch();
        Ok(StageOutcome::Staged)
    }

    /// 暂存当前选中记录的字段修改
    pub fn stage_active_field(&mut self, field: &str, value: &str) -> Result<StageOutcome, EditError> {
        let id = self.active.ok_or(EditError::NoActiveRecord)?;
        self.stage_field_change(id, field, value)
    }

    fn touch(&mut self) {
        if self.config.autosave {
            let generation = self.autosave.schedule(Instant::now());
            debug!("自动保存计时 #{}", generation);
        }
    }

    /// 撤销最后一次修改
    pub fn undo(&mut self) -> Result<FieldChange, EditError> {
        self.doc()?;
        let change = self.tracker.undo()?.clone();
        self.doc_mut()?
            .apply_field(change.node, &change.field, &change.old_value)?;
        self.touch();
        Ok(change)
    }

    /// 重做上一次撤销的修改
    pub fn redo(&mut self) -> Result<FieldChange, EditError> {
        self.doc()?;
        let change = self.tracker.redo()?.clone();
        self.doc_mut()?
            .apply_field(change.node, &change.field, &change.new_value)?;
        self.touch();
        Ok(change)
    }

    pub fn can_undo(&self) -> bool {
        self.tracker.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.tracker.can_redo()
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    /// 是否存在未保存的修改
    pub fn has_unsaved_changes(&self) -> bool {
        self.tracker.has_pending()
    }

    /// 保存到指定文件
    ///
    /// 写入文档来源文件成功后清空变更追踪；写入其他文件（另存为）时
    /// 变更保留，来源文件仍可再保存。失败时文件已还原，变更保留以便重试。
    pub fn save(&mut self, path: &Path) -> Result<SaveReport, SaveError> {
        let source = match &self.document {
            Some(doc) => doc.path.clone(),
            None => return Err(SaveError::NoDocument),
        };
        let pending = self.tracker.pending();
        let report = self.coordinator.save(path, &pending)?;
        if source.as_deref() == Some(path) {
            self.tracker.clear();
            self.autosave.cancel();
        } else {
            info!("已另存为 {:?}，来源文件的修改仍待保存", path);
        }
        Ok(report)
    }

    /// 保存到文档来源文件
    pub fn save_to_original(&mut self) -> Result<SaveReport, SaveError> {
        let path = self.document_path().ok_or(SaveError::NoDocument)?;
        self.save(&path)
    }

    fn document_path(&self) -> Option<PathBuf> {
        self.document.as_ref().and_then(|doc| doc.path.clone())
    }

    /// 自动保存是否在等待触发
    pub fn autosave_pending(&self) -> bool {
        self.autosave.is_pending()
    }

    /// 检查自动保存是否到期，到期且有修改时执行保存
    pub fn poll_autosave(&mut self, now: Instant) -> Option<Result<SaveReport, SaveError>> {
        if !self.config.autosave || !self.autosave.poll(now) {
            return None;
        }
        if !self.has_unsaved_changes() {
            debug!("自动保存到期，但没有待写修改");
            return None;
        }
        let result = self.save_to_original();
        if let Err(e) = &result {
            warn!("自动保存失败: {}", e);
        }
        Some(result)
    }

    /// 生成编辑摘要
    pub fn summary(&self) -> String {
        let name = self
            .document
            .as_ref()
            .map(|doc| doc.get_name())
            .unwrap_or_else(|| "<none>".to_string());
        format!(
            "文档: {}, 修改状态: {}, {}",
            name,
            if self.has_unsaved_changes() {
                "已修改"
            } else {
                "未修改"
            },
            self.tracker.summary()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::EntityKind;
    use std::time::Duration;
    use tempfile::TempDir;

    const DOC: &str = "<?xml version=\"1.0\"?>\n<seiscomp xmlns=\"http://geofon.gfz-potsdam.de/ns/seiscomp3-schema/0.12\">\n  <Inventory>\n    <network publicID=\"NET\" code=\"GE\">\n      <station publicID=\"STA\" code=\"APE\">\n        <latitude>37.07</latitude>\n        <sensorLocation publicID=\"LOC\" code=\"\">\n          <stream code=\"BHZ\" publicID=\"smp2024ABZ\">\n            <gain>1500</gain>\n            <sampleRateNumerator>20</sampleRateNumerator>\n          </stream>\n        </sensorLocation>\n      </station>\n    </network>\n  </Inventory>\n</seiscomp>\n";

    fn session_with_file() -> (TempDir, PathBuf, EditingSession) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.xml");
        std::fs::write(&path, DOC).unwrap();
        let mut session = EditingSession::default();
        session.load_document(&path).unwrap();
        (dir, path, session)
    }

    fn find(session: &EditingSession, kind: EntityKind) -> NodeId {
        session
            .document()
            .unwrap()
            .iter()
            .find(|(_, r)| r.kind == kind)
            .map(|(id, _)| id)
            .unwrap()
    }

    #[test]
    fn test_no_document() {
        let mut session = EditingSession::default();
        assert_eq!(session.list_children(None).unwrap_err(), EditError::NoDocument);
        assert!(matches!(session.save_to_original(), Err(SaveError::NoDocument)));
        assert_eq!(session.undo().unwrap_err(), EditError::NoDocument);
    }

    #[test]
    fn test_failed_load_keeps_previous_document() {
        let (dir, _path, mut session) = session_with_file();
        let bad = dir.path().join("bad.xml");
        std::fs::write(&bad, "<seiscomp><Inventory>").unwrap();
        assert!(session.load_document(&bad).is_err());
        assert_eq!(session.document().unwrap().get_name(), "inventory.xml");
    }

    #[test]
    fn test_stage_unchanged_value() {
        let (_dir, _path, mut session) = session_with_file();
        let stream = find(&session, EntityKind::Stream);
        assert_eq!(
            session.stage_field_change(stream, "gain", "1500").unwrap(),
            StageOutcome::Unchanged
        );
        assert!(!session.has_unsaved_changes());
        assert!(!session.autosave_pending());
    }

    #[test]
    fn test_stage_updates_live_model() {
        let (_dir, _path, mut session) = session_with_file();
        let stream = find(&session, EntityKind::Stream);
        session.select(stream).unwrap();
        assert_eq!(
            session.stage_active_field("gainUnit", "M/S").unwrap(),
            StageOutcome::Staged
        );
        assert_eq!(session.read_active_field("gainUnit").unwrap(), "M/S");
        assert!(session.has_unsaved_changes());
        assert!(session.autosave_pending());
    }

    #[test]
    fn test_stage_rejections() {
        let (_dir, _path, mut session) = session_with_file();
        let stream = find(&session, EntityKind::Stream);
        assert!(matches!(
            session.stage_field_change(stream, "sampleRate", "40"),
            Err(EditError::ReadOnlyField { .. })
        ));
        assert!(matches!(
            session.stage_field_change(stream, "publicID", "x"),
            Err(EditError::ReadOnlyField { .. })
        ));
        assert!(matches!(
            session.stage_field_change(stream, "azimuth", "400"),
            Err(EditError::InvalidValue { .. })
        ));
        assert!(matches!(
            session.stage_field_change(stream, "latitude", "1"),
            Err(EditError::UnknownField { .. })
        ));
        assert!(matches!(
            session.stage_field_change(NodeId(99), "gain", "1"),
            Err(EditError::StaleHandle(_))
        ));
        assert_eq!(
            session.stage_active_field("gain", "1").unwrap_err(),
            EditError::NoActiveRecord
        );
        assert!(!session.has_unsaved_changes());
    }

    #[test]
    fn test_undo_redo_live_model() {
        let (_dir, _path, mut session) = session_with_file();
        let station = find(&session, EntityKind::Station);
        session.stage_field_change(station, "latitude", "38.0").unwrap();
        session.undo().unwrap();
        assert_eq!(session.read_field(station, "latitude").unwrap(), "37.07");
        assert!(!session.has_unsaved_changes());
        session.redo().unwrap();
        assert_eq!(session.read_field(station, "latitude").unwrap(), "38.0");
        assert!(session.has_unsaved_changes());
    }

    #[test]
    fn test_save_clears_tracker() {
        let (_dir, path, mut session) = session_with_file();
        let station = find(&session, EntityKind::Station);
        session.stage_field_change(station, "latitude", "38.0").unwrap();
        let report = session.save_to_original().unwrap();
        assert_eq!(report.fields_written, 1);
        assert!(!session.has_unsaved_changes());
        assert!(!session.can_undo());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            DOC.replace("<latitude>37.07</latitude>", "<latitude>38.0</latitude>")
        );
    }

    #[test]
    fn test_autosave_fires_after_delay() {
        let (_dir, path, mut session) = session_with_file();
        let stream = find(&session, EntityKind::Stream);
        session.stage_field_change(stream, "gain", "2000").unwrap();

        let now = Instant::now();
        assert!(session.poll_autosave(now).is_none());
        let result = session.poll_autosave(now + Duration::from_secs(2)).unwrap();
        assert!(result.is_ok());
        assert!(std::fs::read_to_string(&path).unwrap().contains("<gain>2000</gain>"));
        assert!(session.poll_autosave(now + Duration::from_secs(4)).is_none());
    }

    #[test]
    fn test_autosave_disabled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.xml");
        std::fs::write(&path, DOC).unwrap();
        let config = EditorConfig {
            autosave: false,
            ..EditorConfig::default()
        };
        let mut session = EditingSession::new(config);
        session.load_document(&path).unwrap();
        let stream = find(&session, EntityKind::Stream);
        session.stage_field_change(stream, "gain", "2000").unwrap();
        assert!(!session.autosave_pending());
        assert!(session
            .poll_autosave(Instant::now() + Duration::from_secs(60))
            .is_none());
    }

    #[test]
    fn test_clear_absent_attribute_is_noop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.xml");
        let doc = DOC.replace("<network publicID=\"NET\" code=\"GE\">", "<network publicID=\"NET\">");
        std::fs::write(&path, &doc).unwrap();
        let mut session = EditingSession::default();
        session.load_document(&path).unwrap();

        let network = find(&session, EntityKind::Network);
        assert_eq!(
            session.stage_field_change(network, "code", "").unwrap(),
            StageOutcome::Unchanged
        );
        assert!(session.tracker().is_empty());
        assert!(!session.autosave_pending());

        let report = session.save_to_original().unwrap();
        assert_eq!(report.fields_written, 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), doc);
    }

    #[test]
    fn test_save_attribute_edits() {
        let (_dir, path, mut session) = session_with_file();
        let station = find(&session, EntityKind::Station);
        let location = find(&session, EntityKind::SensorLocation);
        session.stage_field_change(station, "code", "APE2").unwrap();
        session.stage_field_change(station, "name", "Apirathos").unwrap();
        session.stage_field_change(location, "code", "00").unwrap();
        session.save_to_original().unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            DOC.replace(
                "<station publicID=\"STA\" code=\"APE\">",
                "<station publicID=\"STA\" code=\"APE2\" name=\"Apirathos\">"
            )
            .replace(
                "<sensorLocation publicID=\"LOC\" code=\"\">",
                "<sensorLocation publicID=\"LOC\" code=\"00\">"
            )
        );
    }

    #[test]
    fn test_save_as_keeps_source_changes() {
        let (dir, path, mut session) = session_with_file();
        let stream = find(&session, EntityKind::Stream);
        session.stage_field_change(stream, "gain", "2000").unwrap();

        let copy = dir.path().join("copy.xml");
        std::fs::copy(&path, &copy).unwrap();
        session.save(&copy).unwrap();
        assert!(std::fs::read_to_string(&copy).unwrap().contains("<gain>2000</gain>"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), DOC);
        assert!(session.has_unsaved_changes());

        session.save_to_original().unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("<gain>2000</gain>"));
        assert!(!session.has_unsaved_changes());
    }

    #[test]
    fn test_summary() {
        let (_dir, _path, session) = session_with_file();
        assert!(session.summary().contains("inventory.xml"));
        assert!(session.summary().contains("未修改"));
    }
}

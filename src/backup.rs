//! 保存流程：备份 → 读取 → 打补丁 → 写入，失败时还原备份
//!
//! 备份在保存成功后保留在磁盘上，作为上一个版本。

use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::io::{
    DefaultInventoryReader, DefaultInventoryWriter, InventoryReader, InventoryWriter,
    RawInventoryData,
};
use crate::patch::{ChangeSet, PatchWriter};
use crate::utils::{backup_path_for, SaveError, BACKUP_SUFFIX};

/// 一次成功保存的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub path: PathBuf,
    pub backup_path: PathBuf,
    pub records_patched: usize,
    pub fields_written: usize,
    pub bytes_written: usize,
}

/// 备份/还原协调器
pub struct BackupCoordinator {
    reader: Box<dyn InventoryReader>,
    writer: Box<dyn InventoryWriter>,
    patcher: PatchWriter,
    suffix: String,
}

impl Default for BackupCoordinator {
    fn default() -> Self {
        Self::new(
            Box::new(DefaultInventoryReader),
            Box::new(DefaultInventoryWriter),
        )
    }
}

impl BackupCoordinator {
    pub fn new(reader: Box<dyn InventoryReader>, writer: Box<dyn InventoryWriter>) -> Self {
        Self {
            reader,
            writer,
            patcher: PatchWriter::default(),
            suffix: BACKUP_SUFFIX.to_string(),
        }
    }

    pub fn with_patcher(mut self, patcher: PatchWriter) -> Self {
        self.patcher = patcher;
        self
    }

    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.suffix = suffix.to_string();
        self
    }

    pub fn backup_path(&self, path: &Path) -> PathBuf {
        backup_path_for(path, &self.suffix)
    }

    /// 保存修改到 `path`
    ///
    /// 失败时文件恢复为保存前的状态；只有备份也无法还原时返回 `RestoreFailed`。
    pub fn save(&self, path: &Path, changes: &ChangeSet) -> Result<SaveReport, SaveError> {
        let backup = self.backup_path(path);
        std::fs::rename(path, &backup).map_err(|source| SaveError::BackupFailed {
            path: backup.clone(),
            source,
        })?;
        info!("已备份 {:?} -> {:?}", path, backup);

        match self.patch_and_write(&backup, path, changes) {
            Ok(bytes_written) => {
                let report = SaveReport {
                    path: path.to_path_buf(),
                    backup_path: backup,
                    records_patched: changes.values().filter(|e| !e.is_empty()).count(),
                    fields_written: changes.values().map(|e| e.len()).sum(),
                    bytes_written,
                };
                info!(
                    "已保存 {:?}: {} 个记录, {} 个字段",
                    path, report.records_patched, report.fields_written
                );
                Ok(report)
            }
            Err(cause) => {
                warn!("保存失败，正在还原备份: {}", cause);
                Err(self.restore(path, &backup, cause))
            }
        }
    }

    fn patch_and_write(&self, backup: &Path, path: &Path, changes: &ChangeSet) -> Result<usize, SaveError> {
        let original = self
            .reader
            .read(backup)
            .map_err(|source| SaveError::ReadFailed { source })?;
        let patched = self.patcher.apply(&original.bytes, changes)?;
        let data = RawInventoryData::new(patched);
        self.writer
            .write(&data, path)
            .map_err(|source| SaveError::WriteFailed { source })?;
        Ok(data.bytes.len())
    }

    /// 把备份改回原路径，返回应交给调用方的错误
    fn restore(&self, path: &Path, backup: &Path, cause: SaveError) -> SaveError {
        if path.exists() {
            if let Err(e) = std::fs::remove_file(path) {
                warn!("无法删除未完成的文件 {:?}: {}", path, e);
            }
        }
        match std::fs::rename(backup, path) {
            Ok(()) => {
                info!("已还原 {:?}", path);
                cause
            }
            Err(source) => {
                error!("还原失败，原文件保留在 {:?}: {}", backup, source);
                SaveError::RestoreFailed {
                    cause: Box::new(cause),
                    backup: backup.to_path_buf(),
                    source,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::EntityKind;
    use crate::patch::FieldEdits;
    use crate::record::RecordKey;
    use std::io;
    use tempfile::TempDir;

    const DOC: &str = "<seiscomp xmlns=\"http://geofon.gfz-potsdam.de/ns/seiscomp3-schema/0.12\">\n  <Inventory>\n    <sensor publicID=\"S1\" name=\"STS-2\">\n      <model>A</model>\n    </sensor>\n  </Inventory>\n</seiscomp>\n";

    struct FailingWriter;

    impl InventoryWriter for FailingWriter {
        fn write(&self, _data: &RawInventoryData, path: &Path) -> io::Result<()> {
            // 先留下半截文件，再报错
            std::fs::write(path, b"<seisc")?;
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }
    }

    fn changes(field: &str, value: &str) -> ChangeSet {
        let mut edits = FieldEdits::new();
        edits.set(field, value);
        let mut set = ChangeSet::new();
        set.insert(RecordKey::public_id(EntityKind::Sensor, "S1"), edits);
        set
    }

    #[test]
    fn test_save_keeps_backup() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.xml");
        std::fs::write(&path, DOC).unwrap();

        let report = BackupCoordinator::default()
            .save(&path, &changes("model", "B"))
            .unwrap();
        assert_eq!(report.records_patched, 1);
        assert_eq!(report.backup_path, dir.path().join("inventory.xml.bak"));
        assert_eq!(std::fs::read_to_string(&report.backup_path).unwrap(), DOC);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            DOC.replace("<model>A</model>", "<model>B</model>")
        );
    }

    #[test]
    fn test_write_failure_restores_original() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.xml");
        std::fs::write(&path, DOC).unwrap();

        let coordinator =
            BackupCoordinator::new(Box::new(DefaultInventoryReader), Box::new(FailingWriter));
        let err = coordinator.save(&path, &changes("model", "B")).unwrap_err();
        assert!(matches!(err, SaveError::WriteFailed { .. }));
        assert_eq!(std::fs::read(&path).unwrap(), DOC.as_bytes());
        assert!(!coordinator.backup_path(&path).exists());
    }

    #[test]
    fn test_patch_failure_restores_original() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.xml");
        std::fs::write(&path, DOC).unwrap();

        let mut set = changes("model", "B");
        let mut edits = FieldEdits::new();
        edits.set("model", "C");
        set.insert(RecordKey::public_id(EntityKind::Sensor, "missing"), edits);
        let err = BackupCoordinator::default().save(&path, &set).unwrap_err();
        assert!(matches!(err, SaveError::Patch(_)));
        assert_eq!(std::fs::read(&path).unwrap(), DOC.as_bytes());
    }

    #[test]
    fn test_missing_file_fails_before_mutation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.xml");
        let err = BackupCoordinator::default()
            .save(&path, &changes("model", "B"))
            .unwrap_err();
        assert!(matches!(err, SaveError::BackupFailed { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_custom_suffix() {
        let coordinator = BackupCoordinator::default().with_suffix(".orig");
        assert_eq!(
            coordinator.backup_path(Path::new("/tmp/inv.xml")),
            PathBuf::from("/tmp/inv.xml.orig")
        );
    }
}

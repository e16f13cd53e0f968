//! 编辑-保存流程测试
//!
//! 测试场景：
//! - 暂存 gainUnit 后保存，新字段以兄弟字段的缩进插入
//! - 除被编辑的字段外，文件其余字节保持不变
//! - 写入失败时原文件逐字节还原，待写修改保留
//! - 保存后再次保存不产生任何变化

use std::io;
use std::path::{Path, PathBuf};

use scinv_editor::io::{DefaultInventoryReader, InventoryWriter, RawInventoryData};
use scinv_editor::{
    BackupCoordinator, EditingSession, EditorConfig, EntityKind, InventoryDebugger, NodeId,
    SaveError,
};
use tempfile::TempDir;

const INVENTORY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<seiscomp xmlns="http://geofon.gfz-potsdam.de/ns/seiscomp3-schema/0.12" version="0.12">
  <Inventory>
    <!-- sensors -->
    <sensor publicID="Sensor#STS2" name="STS-2" response="ResponsePAZ#STS2">
      <manufacturer>Streckeisen</manufacturer>
    </sensor>
    <network publicID="Network#GE" code="GE">
      <start>1993-01-01T00:00:00.0000Z</start>
      <description>GEOFON</description>
      <station publicID="Station#APE" code="APE">
        <latitude>37.0689</latitude>
        <longitude>25.5306</longitude>
        <sensorLocation publicID="SensorLocation#APE" code="">
          <start>2004-05-17T00:00:00.0000Z</start>
          <stream code="BHZ" datalogger="Datalogger#Q330" sensor="Sensor#STS2" publicID="smp2024ABZ">
            <start>2004-05-17T00:00:00.0000Z</start>
            <dataloggerSerialNumber>xxxx</dataloggerSerialNumber>
            <sampleRateNumerator>20</sampleRateNumerator>
            <sampleRateDenominator>1</sampleRateDenominator>
            <depth>0</depth>
            <azimuth>0</azimuth>
            <dip>-90</dip>
            <gain>1500</gain>
            <gainFrequency>1</gainFrequency>
            <shared>true</shared>
          </stream>
        </sensorLocation>
      </station>
    </network>
  </Inventory>
</seiscomp>
"#;

struct FailingWriter;

impl InventoryWriter for FailingWriter {
    fn write(&self, _data: &RawInventoryData, _path: &Path) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only volume"))
    }
}

fn write_inventory(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("inventory.xml");
    std::fs::write(&path, INVENTORY).unwrap();
    path
}

fn manual_session() -> EditingSession {
    EditingSession::new(EditorConfig {
        autosave: false,
        ..EditorConfig::default()
    })
}

fn stream_bhz(session: &EditingSession) -> NodeId {
    let network = session.list_children(None).unwrap()[0];
    let station = session.list_children(Some(network)).unwrap()[0];
    let location = session.list_children(Some(station)).unwrap()[0];
    let stream = session.list_children(Some(location)).unwrap()[0];
    assert_eq!(session.record(stream).unwrap().label(), "Stream: BHZ");
    stream
}

#[test]
fn test_gain_unit_insertion_end_to_end() {
    let dir = TempDir::new().unwrap();
    let path = write_inventory(&dir);

    let mut session = manual_session();
    session.load_document(&path).unwrap();
    let stream = stream_bhz(&session);
    assert_eq!(session.read_field(stream, "gainUnit").unwrap(), "");

    session.stage_field_change(stream, "gainUnit", "M/S").unwrap();
    session.save(&path).unwrap();

    let saved = std::fs::read_to_string(&path).unwrap();
    let expected = INVENTORY.replace(
        "            <shared>true</shared>\n",
        "            <shared>true</shared>\n            <gainUnit>M/S</gainUnit>\n",
    );
    assert_eq!(saved, expected);

    // 插入的字段在该通道块内
    let block_start = saved.find("publicID=\"smp2024ABZ\"").unwrap();
    let block_end = saved[block_start..].find("</stream>").unwrap() + block_start;
    assert!(saved[block_start..block_end].contains("<gainUnit>M/S</gainUnit>"));

    // 备份是保存前的文件
    assert_eq!(
        std::fs::read_to_string(dir.path().join("inventory.xml.bak")).unwrap(),
        INVENTORY
    );
}

#[test]
fn test_single_field_update_locality() {
    let dir = TempDir::new().unwrap();
    let path = write_inventory(&dir);

    let mut session = manual_session();
    session.load_document(&path).unwrap();
    let stream = stream_bhz(&session);
    session.stage_field_change(stream, "gain", "2000").unwrap();
    session.save(&path).unwrap();

    let saved = std::fs::read(&path).unwrap();
    let ranges = InventoryDebugger::changed_ranges(INVENTORY.as_bytes(), &saved);
    assert_eq!(ranges.len(), 1);

    let range = ranges[0];
    let gain_offset = INVENTORY.find("<gain>1500</gain>").unwrap();
    assert!(range.old_start <= gain_offset && gain_offset < range.old_end);
    assert_eq!(
        &INVENTORY[range.old_start..range.old_end],
        "            <gain>1500</gain>\n"
    );
    assert_eq!(
        &saved[range.new_start..range.new_end],
        b"            <gain>2000</gain>\n"
    );
}

#[test]
fn test_deletion_removes_tag() {
    let dir = TempDir::new().unwrap();
    let path = write_inventory(&dir);

    let mut session = manual_session();
    session.load_document(&path).unwrap();
    let stream = stream_bhz(&session);
    session.stage_field_change(stream, "dataloggerSerialNumber", "").unwrap();
    session.save(&path).unwrap();

    let saved = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        saved,
        INVENTORY.replace("            <dataloggerSerialNumber>xxxx</dataloggerSerialNumber>\n", "")
    );
}

#[test]
fn test_non_stream_records_are_patchable() {
    let dir = TempDir::new().unwrap();
    let path = write_inventory(&dir);

    let mut session = manual_session();
    session.load_document(&path).unwrap();
    let roots = session.list_children(None).unwrap();
    let network = roots[0];
    let sensor = roots[1];
    assert_eq!(session.record(sensor).unwrap().kind, EntityKind::Sensor);

    session.stage_field_change(sensor, "model", "STS-2.5").unwrap();
    session.stage_field_change(network, "description", "GEOFON Program").unwrap();
    session.save(&path).unwrap();

    let saved = std::fs::read_to_string(&path).unwrap();
    let expected = INVENTORY
        .replace(
            "      <manufacturer>Streckeisen</manufacturer>\n",
            "      <manufacturer>Streckeisen</manufacturer>\n      <model>STS-2.5</model>\n",
        )
        .replace("<description>GEOFON</description>", "<description>GEOFON Program</description>");
    assert_eq!(saved, expected);
}

#[test]
fn test_write_failure_restores_and_keeps_changes() {
    let dir = TempDir::new().unwrap();
    let path = write_inventory(&dir);

    let coordinator =
        BackupCoordinator::new(Box::new(DefaultInventoryReader), Box::new(FailingWriter));
    let mut session = EditingSession::with_coordinator(EditorConfig::default(), coordinator);
    session.load_document(&path).unwrap();
    let stream = stream_bhz(&session);
    session.stage_field_change(stream, "gain", "2000").unwrap();

    let err = session.save(&path).unwrap_err();
    assert!(matches!(err, SaveError::WriteFailed { .. }));
    assert_eq!(std::fs::read(&path).unwrap(), INVENTORY.as_bytes());
    assert!(!dir.path().join("inventory.xml.bak").exists());
    assert!(session.has_unsaved_changes());

    // 修改仍可用正常的协调器保存
    let mut retry = manual_session();
    retry.load_document(&path).unwrap();
    let stream = stream_bhz(&retry);
    retry.stage_field_change(stream, "gain", "2000").unwrap();
    retry.save(&path).unwrap();
    assert!(std::fs::read_to_string(&path).unwrap().contains("<gain>2000</gain>"));
}

#[test]
fn test_idempotent_resave() {
    let dir = TempDir::new().unwrap();
    let path = write_inventory(&dir);

    let mut session = manual_session();
    session.load_document(&path).unwrap();
    let stream = stream_bhz(&session);
    session.stage_field_change(stream, "gain", "2000").unwrap();
    session.save(&path).unwrap();
    let first = std::fs::read(&path).unwrap();

    assert!(!session.has_unsaved_changes());
    let report = session.save(&path).unwrap();
    assert_eq!(report.fields_written, 0);
    assert_eq!(std::fs::read(&path).unwrap(), first);
}

#[test]
fn test_comment_with_public_id_is_ignored() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("inventory.xml");
    let text = INVENTORY.replace("<!-- sensors -->", "<!-- old: publicID=\"smp2024ABZ\" <gain>1</gain> -->");
    std::fs::write(&path, &text).unwrap();

    let mut session = manual_session();
    session.load_document(&path).unwrap();
    let stream = stream_bhz(&session);
    session.stage_field_change(stream, "gain", "2000").unwrap();
    session.save(&path).unwrap();

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        text.replace("<gain>1500</gain>", "<gain>2000</gain>")
    );
}

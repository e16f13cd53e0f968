//! 命令行中的记录选择器
//!
//! - `GE` / `GE.APE` / `GE.APE.00` / `GE.APE.00.BHZ`（位置码可为空：`GE.APE..BHZ`）
//! - `sensor:STS-2` / `datalogger:Q330`

use std::fmt;
use std::str::FromStr;

use crate::inventory::Inventory;
use crate::record::NodeId;
use crate::utils::SelectorError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSelector {
    /// 网络.台站.位置.通道，1 到 4 级
    Path(Vec<String>),
    Sensor(String),
    Datalogger(String),
}

impl FromStr for RecordSelector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SelectorError::Invalid(s.to_string());

        if let Some(name) = s.strip_prefix("sensor:") {
            return Ok(RecordSelector::Sensor(name.to_string()));
        }
        if let Some(name) = s.strip_prefix("datalogger:") {
            return Ok(RecordSelector::Datalogger(name.to_string()));
        }

        let parts: Vec<String> = s.split('.').map(str::to_string).collect();
        if parts.len() > 4 || parts[0].is_empty() {
            return Err(invalid());
        }
        // 只有位置码允许为空
        if parts
            .iter()
            .enumerate()
            .any(|(level, code)| code.is_empty() && level != 2)
        {
            return Err(invalid());
        }
        Ok(RecordSelector::Path(parts))
    }
}

impl fmt::Display for RecordSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordSelector::Path(parts) => write!(f, "{}", parts.join(".")),
            RecordSelector::Sensor(name) => write!(f, "sensor:{}", name),
            RecordSelector::Datalogger(name) => write!(f, "datalogger:{}", name),
        }
    }
}

impl RecordSelector {
    /// 在文档中查找记录，多个匹配时取第一个
    pub fn resolve(&self, inventory: &Inventory) -> Result<NodeId, SelectorError> {
        let not_found = || SelectorError::NotFound(self.to_string());
        let identity_is = |id: &NodeId, code: &str| {
            inventory
                .get(*id)
                .map_or(false, |record| record.identity() == code)
        };

        match self {
            RecordSelector::Sensor(name) => inventory
                .sensors()
                .into_iter()
                .find(|id| identity_is(id, name.as_str()))
                .ok_or_else(not_found),
            RecordSelector::Datalogger(name) => inventory
                .dataloggers()
                .into_iter()
                .find(|id| identity_is(id, name.as_str()))
                .ok_or_else(not_found),
            RecordSelector::Path(parts) => {
                let mut current: Option<NodeId> = None;
                for code in parts {
                    let candidates = match current {
                        None => inventory.networks(),
                        Some(parent) => inventory.get(parent).map(|r| r.children.clone()).unwrap_or_default(),
                    };
                    current = Some(
                        candidates
                            .into_iter()
                            .find(|id| identity_is(id, code.as_str()))
                            .ok_or_else(not_found)?,
                    );
                }
                current.ok_or_else(not_found)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const XML: &str = r#"<seiscomp xmlns="http://geofon.gfz-potsdam.de/ns/seiscomp3-schema/0.12"><Inventory>
<sensor name="STS-2"/>
<datalogger name="Q330"/>
<network code="GE"><station code="APE"><sensorLocation code="">
<stream code="BHZ"/><stream code="BHN"/>
</sensorLocation><sensorLocation code="10"><stream code="HHZ"/></sensorLocation></station></network>
</Inventory></seiscomp>"#;

    #[test]
    fn test_parse() {
        assert_eq!(
            "GE.APE..BHZ".parse::<RecordSelector>().unwrap(),
            RecordSelector::Path(vec!["GE".into(), "APE".into(), "".into(), "BHZ".into()])
        );
        assert_eq!(
            "sensor:STS-2".parse::<RecordSelector>().unwrap(),
            RecordSelector::Sensor("STS-2".into())
        );
        assert!("".parse::<RecordSelector>().is_err());
        assert!("GE.APE.".parse::<RecordSelector>().is_ok());
        assert!("GE.APE.00.BHZ.X".parse::<RecordSelector>().is_err());
        assert!(".APE".parse::<RecordSelector>().is_err());
        assert!("GE..00".parse::<RecordSelector>().is_err());
    }

    #[test]
    fn test_resolve() {
        let inventory = Inventory::from_bytes(XML.as_bytes()).unwrap();
        let resolve = |s: &str| {
            s.parse::<RecordSelector>()
                .unwrap()
                .resolve(&inventory)
                .map(|id| inventory.get(id).unwrap().label())
        };

        assert_eq!(resolve("GE").unwrap(), "Network: GE");
        assert_eq!(resolve("GE.APE..BHN").unwrap(), "Stream: BHN");
        assert_eq!(resolve("GE.APE.10.HHZ").unwrap(), "Stream: HHZ");
        assert_eq!(resolve("sensor:STS-2").unwrap(), "Sensor: STS-2");
        assert_eq!(resolve("datalogger:Q330").unwrap(), "Datalogger: Q330");
        assert_eq!(
            resolve("GE.XXX"),
            Err(SelectorError::NotFound("GE.XXX".to_string()))
        );
    }
}

use std::fmt::Write;

use crate::inventory::Inventory;
use crate::record::NodeId;

/// 库存文件结构调试器
pub struct InventoryDebugger;

/// 两个版本之间的一段差异（字节偏移）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangedRange {
    /// 在旧文件中的区间
    pub old_start: usize,
    pub old_end: usize,
    /// 在新文件中的区间
    pub new_start: usize,
    pub new_end: usize,
}

impl InventoryDebugger {
    /// 生成记录树文本（含字节区间）
    pub fn dump_structure(inventory: &Inventory) -> Result<String, std::fmt::Error> {
        let mut output = String::new();
        writeln!(output, "=== 库存文件结构 ===")?;
        writeln!(output, "文件: {}", inventory.get_name())?;
        writeln!(output, "命名空间: {}", inventory.namespace)?;
        writeln!(output, "记录数: {}", inventory.len())?;
        writeln!(output)?;

        for id in inventory.children(None).unwrap_or_default() {
            Self::dump_record(inventory, id, &mut output, 0)?;
        }
        Ok(output)
    }

    fn dump_record(inventory: &Inventory, id: NodeId, output: &mut String, indent: usize) -> std::fmt::Result {
        let record = match inventory.get(id) {
            Some(record) => record,
            None => return Ok(()),
        };
        let prefix = "  ".repeat(indent);

        writeln!(
            output,
            "{}{} [{}..{}] key={}",
            prefix,
            record.label(),
            record.span.start,
            record.span.end,
            record.record_key()
        )?;
        for field in &record.fields {
            match field.span {
                Some(span) => writeln!(
                    output,
                    "{}  {} = \"{}\" [{}..{}]",
                    prefix, field.name, field.text, span.start, span.end
                )?,
                None => writeln!(output, "{}  {} = \"{}\" (未保存)", prefix, field.name, field.text)?,
            }
        }

        for child in inventory.children(Some(id)).unwrap_or_default() {
            Self::dump_record(inventory, child, output, indent + 1)?;
        }
        Ok(())
    }

    /// 比较两个版本，返回按行对齐的差异区间
    ///
    /// 先去掉相同的前缀与后缀行，剩余部分作为一个差异块。
    /// 补丁只改动少数连续位置时，这足以确认改动范围。
    pub fn changed_ranges(old: &[u8], new: &[u8]) -> Vec<ChangedRange> {
        let old_lines = split_lines(old);
        let new_lines = split_lines(new);

        let prefix = old_lines
            .iter()
            .zip(&new_lines)
            .take_while(|(a, b)| old[a.0..a.1] == new[b.0..b.1])
            .count();
        if prefix == old_lines.len() && prefix == new_lines.len() {
            return Vec::new();
        }

        let suffix = old_lines[prefix..]
            .iter()
            .rev()
            .zip(new_lines[prefix..].iter().rev())
            .take_while(|(a, b)| old[a.0..a.1] == new[b.0..b.1])
            .count();

        let old_changed = &old_lines[prefix..old_lines.len() - suffix];
        let new_changed = &new_lines[prefix..new_lines.len() - suffix];
        let boundary = |lines: &[(usize, usize)], all: &[(usize, usize)], total: usize| match (lines.first(), lines.last()) {
            (Some(first), Some(last)) => (first.0, last.1),
            _ => {
                let at = all.get(prefix).map_or(total, |line| line.0);
                (at, at)
            }
        };
        let (old_start, old_end) = boundary(old_changed, &old_lines, old.len());
        let (new_start, new_end) = boundary(new_changed, &new_lines, new.len());

        vec![ChangedRange {
            old_start,
            old_end,
            new_start,
            new_end,
        }]
    }

    /// 差异报告
    pub fn diff_report(old: &[u8], new: &[u8]) -> String {
        let ranges = Self::changed_ranges(old, new);
        if ranges.is_empty() {
            return "文件内容相同".to_string();
        }

        let mut report = String::new();
        for range in ranges {
            report.push_str(&format!(
                "@@ 旧 [{}..{}] -> 新 [{}..{}] @@\n",
                range.old_start, range.old_end, range.new_start, range.new_end
            ));
            for line in String::from_utf8_lossy(&old[range.old_start..range.old_end]).lines() {
                report.push_str(&format!("-{}\n", line));
            }
            for line in String::from_utf8_lossy(&new[range.new_start..range.new_end]).lines() {
                report.push_str(&format!("+{}\n", line));
            }
        }
        report
    }
}

/// 按行切分，每行包含行尾换行符
fn split_lines(bytes: &[u8]) -> Vec<(usize, usize)> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (pos, &b) in bytes.iter().enumerate() {
        if b == b'\n' {
            lines.push((start, pos + 1));
            start = pos + 1;
        }
    }
    if start < bytes.len() {
        lines.push((start, bytes.len()));
    }
    lines
}

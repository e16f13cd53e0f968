//! 单个记录块内的文本修改

use log::debug;
use quick_xml::escape::{escape, partial_escape};

use super::FieldEdits;
use crate::datatypes::{EntityKind, FieldStorage};
use crate::field::Span;
use crate::inventory::parser::{ChildElement, ScannedRecord};
use crate::utils::PatchError;

/// 一次替换：用 `text` 替换原文 `[start, end)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Splice {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl Splice {
    fn replace(span: Span, text: String) -> Self {
        Self {
            start: span.start,
            end: span.end,
            text,
        }
    }

    fn insert(at: usize, text: String) -> Self {
        Self {
            start: at,
            end: at,
            text,
        }
    }

    fn delete(start: usize, end: usize) -> Self {
        Self {
            start,
            end,
            text: String::new(),
        }
    }
}

/// 为一个记录生成替换列表
pub(crate) struct BlockPatcher<'a> {
    original: &'a [u8],
    record: &'a ScannedRecord,
    eol: &'a str,
    default_indent: &'a str,
}

impl<'a> BlockPatcher<'a> {
    pub fn new(
        original: &'a [u8],
        record: &'a ScannedRecord,
        eol: &'a str,
        default_indent: &'a str,
    ) -> Self {
        Self {
            original,
            record,
            eol,
            default_indent,
        }
    }

    pub fn splices(&self, edits: &FieldEdits) -> Result<Vec<Splice>, PatchError> {
        let kind = self.record.kind;
        let mut splices = Vec::new();
        let mut attribute_edits = Vec::new();
        let mut deleted: Vec<&str> = Vec::new();
        let mut inserted: Vec<(&str, &str)> = Vec::new();

        for (field, value) in edits.iter() {
            let spec = kind.field(field).ok_or_else(|| unwritable(kind, field))?;
            match spec.storage {
                FieldStorage::Attribute => attribute_edits.push((spec.name, value)),
                FieldStorage::Element => match (self.find_field(spec.name), value.is_empty()) {
                    (Some(element), false) => {
                        debug!("{}: 替换 <{}>", kind, spec.name);
                        let name = tag_name(&self.original[element.span.start..element.span.end]);
                        splices.push(Splice::replace(element.span, field_xml(&name, value)));
                    }
                    (Some(element), true) => {
                        debug!("{}: 删除 <{}>", kind, spec.name);
                        deleted.push(spec.name);
                        splices.push(self.delete_element(element.span));
                    }
                    (None, false) => inserted.push((spec.name, value)),
                    (None, true) => {}
                },
                FieldStorage::Key | FieldStorage::Derived => return Err(unwritable(kind, field)),
            }
        }

        if !attribute_edits.is_empty() {
            splices.extend(self.attribute_splices(&attribute_edits)?);
        }

        if !inserted.is_empty() {
            debug!("{}: 插入 {} 个字段", kind, inserted.len());
            splices.push(self.insertion(&inserted, &deleted));
        }

        Ok(splices)
    }

    fn find_field(&self, name: &str) -> Option<&'a ChildElement> {
        self.record
            .child_elements
            .iter()
            .find(|child| child.is_field && child.name == name)
    }

    /// 删除字段元素；元素独占一行时连同整行删除
    fn delete_element(&self, span: Span) -> Splice {
        let bytes = self.original;
        let line_start = bytes[..span.start]
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |pos| pos + 1);
        let newline = bytes[span.end..].iter().position(|&b| b == b'\n');

        let alone_before = is_blank(&bytes[line_start..span.start]);
        match newline {
            Some(offset) if alone_before && is_blank(&bytes[span.end..span.end + offset]) => {
                Splice::delete(line_start, span.end + offset + 1)
            }
            _ => Splice::delete(span.start, span.end),
        }
    }

    /// 记录块第二行的缩进
    fn child_indent(&self) -> String {
        let block = &self.original[self.record.span.start..self.record.span.end];
        let second_line = match block.iter().position(|&b| b == b'\n') {
            Some(pos) => &block[pos + 1..],
            None => return self.default_indent.to_string(),
        };
        let width = second_line
            .iter()
            .take_while(|&&b| b == b' ' || b == b'\t')
            .count();
        let rest = &second_line[width..];
        if width == 0 || rest.starts_with(b"</") || rest.starts_with(b"\r") || rest.starts_with(b"\n") {
            return self.default_indent.to_string();
        }
        String::from_utf8_lossy(&second_line[..width]).into_owned()
    }

    /// 记录自身所在行的缩进
    fn own_indent(&self) -> String {
        let bytes = self.original;
        let start = self.record.span.start;
        let line_start = bytes[..start]
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |pos| pos + 1);
        let prefix = &bytes[line_start..start];
        if is_blank(prefix) {
            String::from_utf8_lossy(prefix).into_owned()
        } else {
            String::new()
        }
    }

    /// 新字段的插入位置：最后一个未被删除的非子记录元素之后，否则紧跟起始标签
    fn insertion_anchor(&self, deleted: &[&str]) -> usize {
        let child_kind = self.record.kind.child_kind();
        self.record
            .child_elements
            .iter()
            .filter(|child| {
                EntityKind::from_element_name(child.name.as_bytes()) != child_kind
                    || child_kind.is_none()
            })
            .filter(|child| !(child.is_field && deleted.contains(&child.name.as_str())))
            .last()
            .map_or(self.record.start_tag.end, |child| child.span.end)
    }

    fn insertion(&self, fields: &[(&str, &str)], deleted: &[&str]) -> Splice {
        let indent = self.child_indent();
        let element = self.qualified_name();
        // 新字段沿用记录元素的命名空间前缀
        let prefix = element.rsplit_once(':').map_or("", |(prefix, _)| prefix);
        let mut text = String::new();
        for (name, value) in fields {
            text.push_str(self.eol);
            text.push_str(&indent);
            if prefix.is_empty() {
                text.push_str(&field_xml(name, value));
            } else {
                text.push_str(&field_xml(&format!("{}:{}", prefix, name), value));
            }
        }

        if self.record.self_closing {
            // `<stream ... />` 展开为起始标签 + 结束标签
            let tag = self.record.start_tag;
            let close = tag.end - 2;
            let trimmed = close
                - self.original[tag.start..close]
                    .iter()
                    .rev()
                    .take_while(|b| b.is_ascii_whitespace())
                    .count();
            text.insert(0, '>');
            text.push_str(self.eol);
            text.push_str(&self.own_indent());
            text.push_str(&format!("</{}>", element));
            return Splice {
                start: trimmed,
                end: tag.end,
                text,
            };
        }

        let at = self.insertion_anchor(deleted);
        if self.original[at..].starts_with(format!("</{}", element).as_bytes()) {
            text.push_str(self.eol);
            text.push_str(&self.own_indent());
        }
        Splice::insert(at, text)
    }

    /// 起始标签中的元素名（保留命名空间前缀）
    fn qualified_name(&self) -> String {
        tag_name(&self.original[self.record.start_tag.start..self.record.start_tag.end])
    }

    /// 起始标签内的属性修改
    fn attribute_splices(&self, edits: &[(&str, &str)]) -> Result<Vec<Splice>, PatchError> {
        let tag = self.record.start_tag;
        let lexed = lex_attributes(&self.original[tag.start..tag.end]).ok_or_else(|| {
            PatchError::Malformed {
                position: tag.start as u64,
                message: format!("cannot read attributes of <{}>", self.record.kind),
            }
        })?;

        let mut splices = Vec::new();
        for (name, value) in edits {
            let existing = lexed.attributes.iter().find(|attr| attr.name == *name);
            match (existing, value.is_empty()) {
                (Some(attr), false) => splices.push(Splice {
                    start: tag.start + attr.value.start,
                    end: tag.start + attr.value.end,
                    text: escape(*value).into_owned(),
                }),
                (Some(attr), true) => {
                    splices.push(Splice::delete(tag.start + attr.leading, tag.start + attr.end))
                }
                (None, false) => splices.push(Splice::insert(
                    tag.start + lexed.append_at,
                    format!(" {}=\"{}\"", name, escape(*value)),
                )),
                (None, true) => {}
            }
        }
        Ok(splices)
    }
}

fn unwritable(kind: EntityKind, field: &str) -> PatchError {
    PatchError::UnwritableField {
        kind,
        field: field.to_string(),
    }
}

fn field_xml(name: &str, value: &str) -> String {
    format!("<{0}>{1}</{0}>", name, partial_escape(value))
}

/// 以 `<` 开头的元素中的限定名，例如 `sc3:model`
fn tag_name(element: &[u8]) -> String {
    let tag = element.get(1..).unwrap_or_default();
    let len = tag
        .iter()
        .position(|&b| b.is_ascii_whitespace() || b == b'>' || b == b'/')
        .unwrap_or(tag.len());
    String::from_utf8_lossy(&tag[..len]).into_owned()
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| b.is_ascii_whitespace())
}

/// 起始标签中的一个属性（偏移相对于标签起点）
#[derive(Debug)]
struct LexedAttribute<'t> {
    name: &'t str,
    /// 属性前空白的起点
    leading: usize,
    /// 引号内的值
    value: Span,
    /// 结束引号之后
    end: usize,
}

#[derive(Debug)]
struct LexedTag<'t> {
    attributes: Vec<LexedAttribute<'t>>,
    /// 追加新属性的位置
    append_at: usize,
}

/// 逐字节读取起始标签中的属性，保留原有引号与空白
fn lex_attributes(tag: &[u8]) -> Option<LexedTag<'_>> {
    let is_name_byte = |b: u8| !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/');

    let mut pos = 1;
    while pos < tag.len() && is_name_byte(tag[pos]) {
        pos += 1;
    }
    let mut lexed = LexedTag {
        attributes: Vec::new(),
        append_at: pos,
    };

    loop {
        let leading = pos;
        while pos < tag.len() && tag[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= tag.len() || matches!(tag[pos], b'>' | b'/') {
            return Some(lexed);
        }

        let name_start = pos;
        while pos < tag.len() && is_name_byte(tag[pos]) {
            pos += 1;
        }
        let name = std::str::from_utf8(&tag[name_start..pos]).ok()?;

        while pos < tag.len() && tag[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if tag.get(pos) != Some(&b'=') {
            return None;
        }
        pos += 1;
        while pos < tag.len() && tag[pos].is_ascii_whitespace() {
            pos += 1;
        }

        let quote = *tag.get(pos)?;
        if quote != b'"' && quote != b'\'' {
            return None;
        }
        let value_start = pos + 1;
        let value_len = tag[value_start..].iter().position(|&b| b == quote)?;
        let value_end = value_start + value_len;
        pos = value_end + 1;

        lexed.attributes.push(LexedAttribute {
            name,
            leading,
            value: Span::new(value_start, value_end),
            end: pos,
        });
        lexed.append_at = pos;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_attributes() {
        let tag = br#"<stream code="BHZ"  publicID='a"b' >"#;
        let lexed = lex_attributes(tag).unwrap();
        assert_eq!(lexed.attributes.len(), 2);
        let code = &lexed.attributes[0];
        assert_eq!(code.name, "code");
        assert_eq!(&tag[code.value.start..code.value.end], b"BHZ");
        let id = &lexed.attributes[1];
        assert_eq!(&tag[id.leading..id.end], br#"  publicID='a"b'"#);
        assert_eq!(lexed.append_at, id.end);
    }

    #[test]
    fn test_lex_no_attributes() {
        let lexed = lex_attributes(b"<stream/>").unwrap();
        assert!(lexed.attributes.is_empty());
        assert_eq!(lexed.append_at, 7);
        assert!(lex_attributes(b"<stream code>").is_none());
    }

    #[test]
    fn test_tag_name() {
        assert_eq!(tag_name(b"<sc3:model>A</sc3:model>"), "sc3:model");
        assert_eq!(tag_name(b"<stream code=\"BHZ\"/>"), "stream");
        assert_eq!(tag_name(b"<gain/>"), "gain");
    }

    #[test]
    fn test_field_xml_escapes() {
        assert_eq!(field_xml("description", "a<b&c"), "<description>a&lt;b&amp;c</description>");
    }
}

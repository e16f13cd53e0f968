//! 带字节偏移的库存文件扫描
//!
//! 加载与保存共用同一次扫描：加载时据此构建实体模型，保存时据此定位
//! 需要修改的元素。记录的位置来自解析器本身，不靠子串搜索，
//! 因此注释或其他属性里出现的 `publicID` 文本不会被误认。

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::datatypes::EntityKind;
use crate::field::{Field, Span};

/// 扫描得到的记录
#[derive(Debug, Clone)]
pub(crate) struct ScannedRecord {
    pub kind: EntityKind,
    pub attributes: Vec<(String, String)>,
    pub fields: Vec<Field>,
    /// 子记录下标
    pub children: Vec<usize>,
    /// 所有直接子元素（字段、子记录及其他元素），按文件顺序
    pub child_elements: Vec<ChildElement>,
    pub parent: Option<usize>,
    pub path: Vec<usize>,
    pub span: Span,
    pub start_tag: Span,
    /// `<stream ... />` 形式
    pub self_closing: bool,
}

impl ScannedRecord {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// 记录的直接子元素
#[derive(Debug, Clone)]
pub(crate) struct ChildElement {
    pub name: String,
    pub span: Span,
    pub is_field: bool,
}

/// 整个文件的扫描结果
#[derive(Debug, Default)]
pub(crate) struct ScannedDocument {
    pub records: Vec<ScannedRecord>,
    pub top_level: Vec<usize>,
    /// 根元素本地名
    pub root_name: Option<String>,
    /// 根元素所在命名空间
    pub root_namespace: Option<String>,
    /// 根元素下 `Inventory` 容器数量
    pub inventory_count: usize,
}

/// 扫描错误（文件不是格式良好的 XML）
#[derive(Debug, Clone)]
pub(crate) struct ScanError {
    pub position: u64,
    pub message: String,
}

enum Frame {
    Root,
    Inventory,
    Record(usize),
    /// 尚未发现子元素的候选字段
    Leaf {
        parent: usize,
        name: String,
        start: usize,
        text: String,
    },
    /// 非字段的元素；`direct_of` 为其所属记录（仅直接子元素）
    Other {
        direct_of: Option<usize>,
        name: String,
        start: usize,
    },
    Ignored,
}

/// 扫描字节流
pub(crate) fn scan(bytes: &[u8]) -> Result<ScannedDocument, ScanError> {
    let mut reader = Reader::from_reader(bytes);
    let mut scanner = Scanner {
        doc: ScannedDocument::default(),
        stack: Vec::new(),
    };

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let end = reader.buffer_position() as usize;
                let start = end - (e.len() + 2);
                scanner
                    .open(&e, Span::new(start, end))
                    .map_err(|message| ScanError {
                        position: start as u64,
                        message,
                    })?;
            }
            Ok(Event::Empty(e)) => {
                let end = reader.buffer_position() as usize;
                let start = end - (e.len() + 3);
                scanner
                    .empty(&e, Span::new(start, end))
                    .map_err(|message| ScanError {
                        position: start as u64,
                        message,
                    })?;
            }
            Ok(Event::End(_)) => {
                let end = reader.buffer_position() as usize;
                scanner.close(end);
            }
            Ok(Event::Text(t)) => {
                if let Some(Frame::Leaf { text, .. }) = scanner.stack.last_mut() {
                    let unescaped = t.unescape().map_err(|e| ScanError {
                        position: reader.buffer_position() as u64,
                        message: e.to_string(),
                    })?;
                    text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(Frame::Leaf { text, .. }) = scanner.stack.last_mut() {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::Eof) => {
                if !scanner.stack.is_empty() {
                    return Err(ScanError {
                        position: reader.buffer_position() as u64,
                        message: "unexpected end of document".to_string(),
                    });
                }
                break;
            }
            Ok(_) => {}
            Err(e) => {
                return Err(ScanError {
                    position: reader.error_position() as u64,
                    message: e.to_string(),
                });
            }
        }
    }

    if scanner.doc.root_name.is_none() {
        return Err(ScanError {
            position: 0,
            message: "document has no root element".to_string(),
        });
    }

    Ok(scanner.doc)
}

struct Scanner {
    doc: ScannedDocument,
    stack: Vec<Frame>,
}

impl Scanner {
    /// 处理开始标签
    fn open(&mut self, e: &BytesStart, tag: Span) -> Result<(), String> {
        let local = e.local_name();
        let local = local.as_ref();

        let frame = match self.stack.last_mut() {
            None => {
                self.set_root(e)?;
                Frame::Root
            }
            Some(Frame::Root) => {
                if local == b"Inventory" {
                    self.doc.inventory_count += 1;
                    Frame::Inventory
                } else {
                    Frame::Ignored
                }
            }
            Some(Frame::Inventory) => match EntityKind::from_element_name(local) {
                Some(kind) if kind.is_top_level() => {
                    Frame::Record(self.push_record(kind, None, e, tag, false)?)
                }
                _ => Frame::Ignored,
            },
            Some(Frame::Record(parent)) => {
                let parent = *parent;
                match self.child_record_kind(parent, local) {
                    Some(kind) => Frame::Record(self.push_record(kind, Some(parent), e, tag, false)?),
                    None => Frame::Leaf {
                        parent,
                        name: String::from_utf8_lossy(local).into_owned(),
                        start: tag.start,
                        text: String::new(),
                    },
                }
            }
            Some(Frame::Other { .. }) | Some(Frame::Ignored) => Frame::Ignored,
            Some(top) => {
                demote_leaf(top);
                Frame::Ignored
            }
        };

        self.stack.push(frame);
        Ok(())
    }

    /// 处理自闭合标签
    fn empty(&mut self, e: &BytesStart, tag: Span) -> Result<(), String> {
        let local = e.local_name();
        let local = local.as_ref();

        match self.stack.last_mut() {
            None => self.set_root(e)?,
            Some(Frame::Root) => {
                if local == b"Inventory" {
                    self.doc.inventory_count += 1;
                }
            }
            Some(Frame::Inventory) => {
                if let Some(kind) = EntityKind::from_element_name(local).filter(|k| k.is_top_level()) {
                    self.push_record(kind, None, e, tag, true)?;
                }
            }
            Some(Frame::Record(parent)) => {
                let parent = *parent;
                match self.child_record_kind(parent, local) {
                    Some(kind) => {
                        self.push_record(kind, Some(parent), e, tag, true)?;
                    }
                    None => {
                        let name = String::from_utf8_lossy(local).into_owned();
                        let record = &mut self.doc.records[parent];
                        record.child_elements.push(ChildElement {
                            name: name.clone(),
                            span: tag,
                            is_field: true,
                        });
                        record.fields.push(Field {
                            name,
                            text: String::new(),
                            span: Some(tag),
                        });
                    }
                }
            }
            Some(Frame::Other { .. }) | Some(Frame::Ignored) => {}
            Some(top) => demote_leaf(top),
        }
        Ok(())
    }

    /// 处理结束标签
    fn close(&mut self, end: usize) {
        match self.stack.pop() {
            Some(Frame::Record(index)) => {
                let record = &mut self.doc.records[index];
                record.span.end = end;
                let span = record.span;
                let name = record.kind.element_name().to_string();
                if let Some(parent) = record.parent {
                    self.doc.records[parent].child_elements.push(ChildElement {
                        name,
                        span,
                        is_field: false,
                    });
                }
            }
            Some(Frame::Leaf {
                parent,
                name,
                start,
                text,
            }) => {
                let span = Span::new(start, end);
                let record = &mut self.doc.records[parent];
                record.child_elements.push(ChildElement {
                    name: name.clone(),
                    span,
                    is_field: true,
                });
                record.fields.push(Field {
                    name,
                    text,
                    span: Some(span),
                });
            }
            Some(Frame::Other {
                direct_of: Some(parent),
                name,
                start,
            }) => {
                self.doc.records[parent].child_elements.push(ChildElement {
                    name,
                    span: Span::new(start, end),
                    is_field: false,
                });
            }
            _ => {}
        }
    }

    fn set_root(&mut self, e: &BytesStart) -> Result<(), String> {
        let qualified = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let ns_attr = match qualified.split_once(':') {
            Some((prefix, _)) => format!("xmlns:{}", prefix),
            None => "xmlns".to_string(),
        };

        let mut namespace = None;
        for attr in e.attributes() {
            let attr = attr.map_err(|e| format!("attribute error: {}", e))?;
            if attr.key.as_ref() == ns_attr.as_bytes() {
                let value = attr
                    .unescape_value()
                    .map_err(|e| format!("attribute error: {}", e))?;
                namespace = Some(value.into_owned());
            }
        }

        self.doc.root_name = Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
        self.doc.root_namespace = namespace;
        Ok(())
    }

    fn child_record_kind(&self, parent: usize, local: &[u8]) -> Option<EntityKind> {
        self.doc.records[parent]
            .kind
            .child_kind()
            .filter(|kind| kind.element_name().as_bytes() == local)
    }

    fn push_record(
        &mut self,
        kind: EntityKind,
        parent: Option<usize>,
        e: &BytesStart,
        tag: Span,
        self_closing: bool,
    ) -> Result<usize, String> {
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|e| format!("attribute error: {}", e))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| format!("attribute error: {}", e))?
                .into_owned();
            attributes.push((key, value));
        }

        let siblings: &[usize] = match parent {
            Some(p) => &self.doc.records[p].children,
            None => &self.doc.top_level,
        };
        let ordinal = siblings
            .iter()
            .filter(|&&i| self.doc.records[i].kind == kind)
            .count();
        let mut path = parent
            .map(|p| self.doc.records[p].path.clone())
            .unwrap_or_default();
        path.push(ordinal);

        let index = self.doc.records.len();
        self.doc.records.push(ScannedRecord {
            kind,
            attributes,
            fields: Vec::new(),
            children: Vec::new(),
            child_elements: Vec::new(),
            parent,
            path,
            span: tag,
            start_tag: tag,
            self_closing,
        });

        match parent {
            Some(p) => {
                let parent_record = &mut self.doc.records[p];
                parent_record.children.push(index);
                if self_closing {
                    parent_record.child_elements.push(ChildElement {
                        name: kind.element_name().to_string(),
                        span: tag,
                        is_field: false,
                    });
                }
            }
            None => self.doc.top_level.push(index),
        }

        Ok(index)
    }
}

/// 候选字段内部出现了子元素：它不是文本字段
fn demote_leaf(frame: &mut Frame) {
    if let Frame::Leaf {
        parent, name, start, ..
    } = frame
    {
        *frame = Frame::Other {
            direct_of: Some(*parent),
            name: std::mem::take(name),
            start: *start,
        };
    }
}

/// 字节区间（左闭右开）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// 检查偏移是否落在区间内
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end
    }
}

/// 记录的文本字段（形如 `<gain>1500</gain>` 的叶子元素）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// 元素本地名
    pub name: String,
    /// 反转义后的文本
    pub text: String,
    /// 在加载时文件中的位置；编辑中新增的字段没有位置
    pub span: Option<Span>,
}

impl Field {
    /// 创建尚未写入文件的字段
    pub fn new(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            text: text.to_string(),
            span: None,
        }
    }

    /// 获取字段名
    pub fn get_name(&self) -> &str {
        &self.name
    }

    /// 获取字段文本
    pub fn get_text(&self) -> &str {
        &self.text
    }
}

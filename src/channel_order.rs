//! 通道（stream）排序
//!
//! 同一传感器位置下的通道按 (频带码, 仪器码, 方向优先级) 排序：
//! 水平分量 E/1、N/2 排在垂直分量 Z 之前。代码不足 3 个字符的通道排在最后。
//! 排序是稳定的，键相同的通道保持原有相对顺序。

use std::cmp::Ordering;

/// 通道排序键
///
/// 变体顺序即比较顺序：所有合法代码都排在 `Short` 之前。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChannelKey {
    Coded {
        band: char,
        instrument: char,
        orientation: u8,
    },
    Short,
}

/// 方向码优先级
fn orientation_priority(c: char) -> u8 {
    match c {
        'E' | '1' => 0,
        'N' | '2' => 1,
        'Z' => 2,
        _ => 3,
    }
}

/// 从通道代码提取排序键（按字符计数，不按字节）
pub fn channel_sort_key(code: &str) -> ChannelKey {
    let mut chars = code.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(band), Some(instrument), Some(orientation)) => ChannelKey::Coded {
            band,
            instrument,
            orientation: orientation_priority(orientation),
        },
        _ => ChannelKey::Short,
    }
}

/// 比较两个通道代码
pub fn compare_channels(a: &str, b: &str) -> Ordering {
    channel_sort_key(a).cmp(&channel_sort_key(b))
}

/// 按通道代码稳定排序任意元素
pub fn order_by_channel<T, F, S>(items: &mut [T], code_of: F)
where
    F: Fn(&T) -> S,
    S: AsRef<str>,
{
    items.sort_by_cached_key(|item| channel_sort_key(code_of(item).as_ref()));
}

/// 排序通道代码列表，返回新列表
pub fn order_codes<S: AsRef<str> + Clone>(codes: &[S]) -> Vec<S> {
    let mut ordered = codes.to_vec();
    order_by_channel(&mut ordered, |code| code.clone());
    ordered
}

/// 字段取值校验
///
/// 规则与原编辑器输入框的校验一致：数值字段只接受十进制数字，
/// 坐标与角度带范围限制，空值永远合法（表示删除）。
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

/// 与原编辑器相同的十进制数字格式
static DECIMAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d*\.?\d*$").expect("valid regex"));

/// 非负十进制数字
static UNSIGNED_DECIMAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d*\.?\d*$").expect("valid regex"));

/// SeisComP 时间格式（不含时区后缀）
const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// 字段校验规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// 任意文本
    Text,
    /// 十进制数字
    Decimal,
    /// 非负十进制数字
    NonNegativeDecimal,
    /// 纬度 [-90, 90]
    Latitude,
    /// 经度 [-180, 180]
    Longitude,
    /// 方位角 [0, 360]
    Azimuth,
    /// 倾角 [-90, 90]
    Dip,
    /// 非负整数
    Count,
    /// `true` / `false`
    Boolean,
    /// SeisComP 时间
    Time,
}

impl FieldRule {
    /// 检查取值是否合法，返回失败原因
    pub fn check(&self, value: &str) -> Result<(), String> {
        if value.is_empty() {
            return Ok(());
        }

        match self {
            FieldRule::Text => Ok(()),
            FieldRule::Decimal => parse_decimal(value, &DECIMAL_RE).map(|_| ()),
            FieldRule::NonNegativeDecimal => parse_decimal(value, &UNSIGNED_DECIMAL_RE).map(|_| ()),
            FieldRule::Latitude => check_range(value, -90.0, 90.0),
            FieldRule::Longitude => check_range(value, -180.0, 180.0),
            FieldRule::Azimuth => check_range(value, 0.0, 360.0),
            FieldRule::Dip => check_range(value, -90.0, 90.0),
            FieldRule::Count => value
                .parse::<u64>()
                .map(|_| ())
                .map_err(|_| format!("不是非负整数: {}", value)),
            FieldRule::Boolean => match value {
                "true" | "false" => Ok(()),
                _ => Err(format!("不是布尔值: {}", value)),
            },
            FieldRule::Time => parse_time(value)
                .map(|_| ())
                .ok_or_else(|| format!("无法识别的时间: {}", value)),
        }
    }
}

/// 按正则检查后转换为数字
///
/// 正则允许 "." 或 "-" 这样的残缺输入，这里再用 `parse` 兜底。
fn parse_decimal(value: &str, pattern: &Regex) -> Result<f64, String> {
    if !pattern.is_match(value) {
        return Err(format!("不是十进制数字: {}", value));
    }
    value
        .parse::<f64>()
        .map_err(|_| format!("不是十进制数字: {}", value))
}

fn check_range(value: &str, min: f64, max: f64) -> Result<(), String> {
    let number = parse_decimal(value, &DECIMAL_RE)?;
    if number < min || number > max {
        return Err(format!("{} 超出范围 [{}, {}]", value, min, max));
    }
    Ok(())
}

/// 解析 SeisComP 时间字段
///
/// 接受 `2020-01-01T00:00:00.0000Z`、`2020-01-01T00:00:00` 以及纯日期。
pub fn parse_time(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.strip_suffix('Z').unwrap_or(value);
    if let Ok(time) = NaiveDateTime::parse_from_str(trimmed, TIME_FORMAT) {
        return Some(time);
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

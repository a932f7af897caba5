//! 通用工具函数

use crate::error::{ClinicError, Result};
use chrono::{NaiveDate, NaiveDateTime};

/// 界面和记录中使用的时间戳格式
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// 日期格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 格式化时间戳
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// 格式化可选时间戳，缺失时显示 "-"
pub fn format_optional_timestamp(ts: Option<&NaiveDateTime>) -> String {
    ts.map(format_timestamp).unwrap_or_else(|| "-".to_string())
}

/// 格式化排队号 (补零到3位)
pub fn format_queue_number(number: u32) -> String {
    format!("{:03}", number)
}

/// 解析操作员输入的日期
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| ClinicError::Validation(format!("日期格式应为 YYYY-MM-DD: '{}'", value.trim())))
}

/// 去除首尾空白，空字符串视为未填写
pub fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_queue_number() {
        assert_eq!(format_queue_number(7), "007");
        assert_eq!(format_queue_number(1234), "1234");
    }

    #[test]
    fn test_format_timestamp() {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(9, 5, 0)
            .unwrap();
        assert_eq!(format_timestamp(&ts), "2024-01-02 09:05:00");
        assert_eq!(format_optional_timestamp(None), "-");
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date(" 1990-05-17 ").unwrap(), NaiveDate::from_ymd_opt(1990, 5, 17).unwrap());
        assert!(matches!(parse_date("17/05/1990"), Err(ClinicError::Validation(_))));
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  "), None);
        assert_eq!(non_empty(" RM-9 "), Some("RM-9".to_string()));
    }
}

//! 回看窗口解析
//!
//! 接受 `168h`、`90m`、`1h30m`、`1.5h` 这类时长写法，另外支持 `d`（天）。
//! 无法解析、为零或为负时回退到默认的 7 天。

use chrono::Duration;

pub const DEFAULT_LOOKBACK_DAYS: i64 = 7;

pub fn default_lookback() -> Duration {
    Duration::days(DEFAULT_LOOKBACK_DAYS)
}

/// 解析回看窗口，`None` 或非法输入返回默认值
pub fn resolve_lookback(raw: Option<&str>) -> Duration {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => parse_duration(value).unwrap_or_else(|| {
            tracing::debug!(since = value, "无法解析回看窗口，使用默认值");
            default_lookback()
        }),
        None => default_lookback(),
    }
}

/// 解析由若干 `<数字><单位>` 片段组成的时长
pub fn parse_duration(value: &str) -> Option<Duration> {
    let mut rest = value;
    let mut total_ms: f64 = 0.0;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let amount: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit_ms = match &rest[..unit_len] {
            "ms" => 1.0,
            "s" => 1_000.0,
            "m" => 60_000.0,
            "h" => 3_600_000.0,
            "d" => 86_400_000.0,
            _ => return None,
        };
        rest = &rest[unit_len..];

        total_ms += amount * unit_ms;
    }

    if !total_ms.is_finite() || total_ms < 1.0 || total_ms > i64::MAX as f64 / 2.0 {
        return None;
    }
    Duration::try_milliseconds(total_ms as i64)
}

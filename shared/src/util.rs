/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Milliseconds elapsed since `start_ms`, clamped at zero
pub fn elapsed_millis(start_ms: i64) -> i64 {
    (now_millis() - start_ms).max(0)
}

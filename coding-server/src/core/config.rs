use marking_printer::protocol::DeviceConstants;
use marking_printer::{ConnectionConfig, Transport};
use std::str::FromStr;
use std::time::Duration;

/// 默认总是可跳过的设备错误码（墨水/溶剂余量提醒类告警）
pub const DEFAULT_SKIPPABLE_ERROR_CODES: [i64; 3] = [1, 2, 17];

/// 服务配置 - 打码线的所有配置项
///
/// # 环境变量
///
/// 除 `DATABASE_URL` 外，所有配置项都有默认值，可通过环境变量覆盖（支持 `.env`）：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | DATABASE_URL | (必填) | PostgreSQL 连接串 |
/// | DATABASE_MAX_CONNECTIONS | 10 | 连接池大小 |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_JSON | false | JSON 日志格式 |
/// | LOG_DIR | (无) | 日志目录，设置后写入滚动日志文件 |
/// | PRINTER_TRANSPORT | tcp | `tcp` 或 `serial` |
/// | PRINTER_ADDR | 127.0.0.1:3100 | 打码机 TCP 地址 |
/// | PRINTER_SERIAL_PATH | /dev/ttyUSB0 | 串口设备 |
/// | PRINTER_BAUD_RATE | 115200 | 串口波特率 |
/// | PRINTER_RECONNECT_MS | 3000 | 重连间隔(毫秒) |
/// | PRINTER_RESPONSE_TIMEOUT_MS | 5000 | 请求响应超时(毫秒) |
/// | PRINTER_COMMAND_TIMEOUT_MS | 2000 | 动作指令超时(毫秒) |
/// | PRINT_QUEUE_CAPACITY | 200 | 待打印队列容量 |
/// | MAX_PRINTED_QUEUE_SIZE | 60 | 已发送待确认上限 |
/// | DB_UPDATE_QUEUE_CAPACITY | 5000 | 待落库队列容量 |
/// | REPLENISH_LOW_WATER | 10 | 补码低水位 |
/// | PERSIST_CHUNK_SIZE | 500 | 落库分块大小 |
/// | DB_POLL_INTERVAL_MS | 100 | 数据库工作者轮询间隔 |
/// | STATUS_INTERVAL_MS | 500 | 状态推送间隔 |
/// | STATUS_POLL_INTERVAL_MS | 1000 | 打码机空闲查询间隔 |
/// | MASKED_CODE | * | 停止时发送的占位码 |
/// | SKIPPABLE_ERROR_CODES | 1,2,17 | 逗号分隔的可跳过错误码 |
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL 连接串
    pub database_url: String,
    pub database_max_connections: u32,
    /// HTTP API 服务端口
    pub http_port: u16,
    pub log_level: String,
    pub log_json: bool,
    pub log_dir: Option<String>,
    /// 打码机连接
    pub printer: PrinterSettings,
    /// 打印流水线参数
    pub pipeline: PipelineConfig,
}

/// 打码机连接配置
#[derive(Debug, Clone)]
pub struct PrinterSettings {
    pub transport: Transport,
    pub reconnect_interval: Duration,
    pub response_timeout: Duration,
}

impl PrinterSettings {
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::new(self.transport.clone())
            .with_reconnect_interval(self.reconnect_interval)
            .with_response_timeout(self.response_timeout)
    }
}

/// 打印流水线参数（队列容量、轮询间隔、设备常量）
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub print_queue_capacity: usize,
    pub max_printed_queue_size: usize,
    pub db_update_queue_capacity: usize,
    pub replenish_low_water: usize,
    pub persist_chunk_size: usize,
    pub db_poll_interval: Duration,
    pub status_interval: Duration,
    /// 无数据时重新查询打码机状态的间隔
    pub status_poll_interval: Duration,
    /// 喷嘴打开中时的重查延迟
    pub opening_poll_delay: Duration,
    /// 停止后等待打码机收尾的最长时间
    pub stop_grace: Duration,
    /// 动作指令超时
    pub command_timeout: Duration,
    pub masked_code: String,
    pub skippable_error_codes: Vec<i64>,
    pub device: DeviceConstants,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            print_queue_capacity: 200,
            max_printed_queue_size: 60,
            db_update_queue_capacity: 5000,
            replenish_low_water: 10,
            persist_chunk_size: 500,
            db_poll_interval: Duration::from_millis(100),
            status_interval: Duration::from_millis(500),
            status_poll_interval: Duration::from_millis(1000),
            opening_poll_delay: Duration::from_millis(500),
            stop_grace: Duration::from_millis(5000),
            command_timeout: Duration::from_millis(2000),
            masked_code: "*".to_string(),
            skippable_error_codes: DEFAULT_SKIPPABLE_ERROR_CODES.to_vec(),
            device: DeviceConstants::default(),
        }
    }
}

impl PipelineConfig {
    /// 已发送待确认队列容量：留出一轮补码的余量
    pub fn printed_queue_capacity(&self) -> usize {
        self.max_printed_queue_size + 2
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_millis(name: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_or(name, default_ms))
}

/// 解析逗号分隔的错误码列表，忽略无法解析的项
pub fn parse_code_list(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect()
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 先加载 `.env`（如存在），缺少 `DATABASE_URL` 时返回错误
    pub fn from_env() -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        let transport = match std::env::var("PRINTER_TRANSPORT")
            .unwrap_or_else(|_| "tcp".into())
            .to_lowercase()
            .as_str()
        {
            "serial" => Transport::serial(
                std::env::var("PRINTER_SERIAL_PATH").unwrap_or_else(|_| "/dev/ttyUSB0".into()),
                env_or("PRINTER_BAUD_RATE", 115_200),
            ),
            "tcp" => Transport::tcp(
                std::env::var("PRINTER_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            ),
            other => anyhow::bail!("PRINTER_TRANSPORT must be `tcp` or `serial`, got `{other}`"),
        };
        transport.validate()?;

        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            print_queue_capacity: env_or("PRINT_QUEUE_CAPACITY", defaults.print_queue_capacity),
            max_printed_queue_size: env_or(
                "MAX_PRINTED_QUEUE_SIZE",
                defaults.max_printed_queue_size,
            ),
            db_update_queue_capacity: env_or(
                "DB_UPDATE_QUEUE_CAPACITY",
                defaults.db_update_queue_capacity,
            ),
            replenish_low_water: env_or("REPLENISH_LOW_WATER", defaults.replenish_low_water),
            persist_chunk_size: env_or("PERSIST_CHUNK_SIZE", defaults.persist_chunk_size).max(1),
            db_poll_interval: env_millis("DB_POLL_INTERVAL_MS", 100),
            status_interval: env_millis("STATUS_INTERVAL_MS", 500),
            status_poll_interval: env_millis("STATUS_POLL_INTERVAL_MS", 1000),
            command_timeout: env_millis("PRINTER_COMMAND_TIMEOUT_MS", 2000),
            masked_code: std::env::var("MASKED_CODE").unwrap_or(defaults.masked_code.clone()),
            skippable_error_codes: std::env::var("SKIPPABLE_ERROR_CODES")
                .map(|raw| parse_code_list(&raw))
                .unwrap_or(defaults.skippable_error_codes.clone()),
            ..defaults
        };

        if pipeline.print_queue_capacity < 2 || pipeline.db_update_queue_capacity < 2 {
            anyhow::bail!("queue capacities must be at least 2");
        }

        Ok(Self {
            database_url,
            database_max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            http_port: env_or("HTTP_PORT", 3000),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: env_or("LOG_JSON", false),
            log_dir: std::env::var("LOG_DIR").ok().filter(|s| !s.is_empty()),
            printer: PrinterSettings {
                transport,
                reconnect_interval: env_millis("PRINTER_RECONNECT_MS", 3000),
                response_timeout: env_millis("PRINTER_RESPONSE_TIMEOUT_MS", 5000),
            },
            pipeline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_defaults() {
        let p = PipelineConfig::default();
        assert_eq!(p.print_queue_capacity, 200);
        assert_eq!(p.max_printed_queue_size, 60);
        assert_eq!(p.printed_queue_capacity(), 62);
        assert_eq!(p.persist_chunk_size, 500);
        assert_eq!(p.replenish_low_water, 10);
        assert_eq!(p.db_poll_interval, Duration::from_millis(100));
        assert_eq!(p.masked_code, "*");
        assert_eq!(p.device.machine_started, 6);
    }

    #[test]
    fn test_parse_code_list() {
        assert_eq!(parse_code_list("1, 2,x,,17"), vec![1, 2, 17]);
        assert!(parse_code_list("").is_empty());
    }

    #[test]
    fn test_connection_config_from_settings() {
        let settings = PrinterSettings {
            transport: Transport::tcp("10.0.0.9:3100"),
            reconnect_interval: Duration::from_millis(750),
            response_timeout: Duration::from_millis(1200),
        };
        let cc = settings.connection_config();
        assert_eq!(cc.reconnect_interval, Duration::from_millis(750));
        assert_eq!(cc.response_timeout, Duration::from_millis(1200));
        assert_eq!(cc.write_terminator, "\r");
    }
}

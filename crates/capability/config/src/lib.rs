//! 网关运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 网关运行配置。
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub udp_host: String,
    pub udp_port: u16,
    pub udp_recv_buffer_bytes: usize,
    pub udp_read_timeout_ms: u64,
    pub dispatch_max_in_flight: usize,
    pub dispatch_block_on_full: bool,
    pub log_sink_host: String,
    pub log_sink_port: u16,
    pub log_heartbeat_secs: u64,
    pub log_send_max_retries: u32,
    pub log_send_backoff_ms: u64,
    pub rate_interval_ms: u64,
    pub opcua_port: u16,
    pub opcua_hostname: String,
    pub opcua_num_groups: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            udp_host: "0.0.0.0".to_string(),
            udp_port: 8000,
            udp_recv_buffer_bytes: 4096,
            udp_read_timeout_ms: 100,
            dispatch_max_in_flight: 1024,
            dispatch_block_on_full: false,
            log_sink_host: "192.168.2.112".to_string(),
            log_sink_port: 1514,
            log_heartbeat_secs: 30,
            log_send_max_retries: 0,
            log_send_backoff_ms: 200,
            rate_interval_ms: 1000,
            opcua_port: 49320,
            opcua_hostname: "localhost".to_string(),
            opcua_num_groups: 10,
        }
    }
}

impl GatewayConfig {
    /// 从环境变量读取配置，未设置的项取默认值。
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let udp_host = env::var("TGW_UDP_HOST").unwrap_or(defaults.udp_host);
        let udp_port = read_with_default("TGW_UDP_PORT", defaults.udp_port)?;
        let udp_recv_buffer_bytes =
            read_with_default("TGW_UDP_RECV_BUFFER_BYTES", defaults.udp_recv_buffer_bytes)?;
        let udp_read_timeout_ms =
            read_with_default("TGW_UDP_READ_TIMEOUT_MS", defaults.udp_read_timeout_ms)?;
        let dispatch_max_in_flight =
            read_with_default("TGW_DISPATCH_MAX_IN_FLIGHT", defaults.dispatch_max_in_flight)?;
        let dispatch_block_on_full =
            read_bool_with_default("TGW_DISPATCH_BLOCK_ON_FULL", defaults.dispatch_block_on_full)?;
        let log_sink_host = env::var("TGW_LOG_SINK_HOST").unwrap_or(defaults.log_sink_host);
        let log_sink_port = read_with_default("TGW_LOG_SINK_PORT", defaults.log_sink_port)?;
        let log_heartbeat_secs =
            read_with_default("TGW_LOG_HEARTBEAT_SECS", defaults.log_heartbeat_secs)?;
        let log_send_max_retries =
            read_with_default("TGW_LOG_SEND_MAX_RETRIES", defaults.log_send_max_retries)?;
        let log_send_backoff_ms =
            read_with_default("TGW_LOG_SEND_BACKOFF_MS", defaults.log_send_backoff_ms)?;
        let rate_interval_ms = read_with_default("TGW_RATE_INTERVAL_MS", defaults.rate_interval_ms)?;
        let opcua_port = read_with_default("TGW_OPCUA_PORT", defaults.opcua_port)?;
        let opcua_hostname = read_optional("TGW_OPCUA_HOSTNAME")
            .or_else(|| read_optional("HOSTNAME"))
            .unwrap_or(defaults.opcua_hostname);
        let opcua_num_groups = read_with_default("TGW_OPCUA_NUM_GROUPS", defaults.opcua_num_groups)?;

        // 以下各项为 0 时后台任务无法运行
        for (key, value) in [
            ("TGW_DISPATCH_MAX_IN_FLIGHT", dispatch_max_in_flight as u64),
            ("TGW_LOG_HEARTBEAT_SECS", log_heartbeat_secs),
            ("TGW_RATE_INTERVAL_MS", rate_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(key.to_string(), "0".to_string()));
            }
        }

        Ok(Self {
            udp_host,
            udp_port,
            udp_recv_buffer_bytes,
            udp_read_timeout_ms,
            dispatch_max_in_flight,
            dispatch_block_on_full,
            log_sink_host,
            log_sink_port,
            log_heartbeat_secs,
            log_send_max_retries,
            log_send_backoff_ms,
            rate_interval_ms,
            opcua_port,
            opcua_hostname,
            opcua_num_groups,
        })
    }
}

fn read_with_default<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> Result<bool, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid(key.to_string(), value)),
    }
}

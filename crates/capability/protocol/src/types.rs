//! 协议汇配置类型定义

use serde::{Deserialize, Serialize};

/// 安全策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityPolicy {
    None,
    Basic128Rsa15,
    Basic256,
    Basic256Sha256,
    #[serde(rename = "Aes128_Sha256_RsaOaep")]
    Aes128Sha256RsaOaep,
    #[serde(rename = "Aes256_Sha256_RsaPss")]
    Aes256Sha256RsaPss,
}

impl SecurityPolicy {
    /// 策略 URI
    pub fn uri(&self) -> &'static str {
        match self {
            SecurityPolicy::None => "http://opcfoundation.org/UA/SecurityPolicy#None",
            SecurityPolicy::Basic128Rsa15 => "http://opcfoundation.org/UA/SecurityPolicy#Basic128Rsa15",
            SecurityPolicy::Basic256 => "http://opcfoundation.org/UA/SecurityPolicy#Basic256",
            SecurityPolicy::Basic256Sha256 => {
                "http://opcfoundation.org/UA/SecurityPolicy#Basic256Sha256"
            }
            SecurityPolicy::Aes128Sha256RsaOaep => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes128_Sha256_RsaOaep"
            }
            SecurityPolicy::Aes256Sha256RsaPss => {
                "http://opcfoundation.org/UA/SecurityPolicy#Aes256_Sha256_RsaPss"
            }
        }
    }
}

/// 消息安全模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageSecurityMode {
    None,
    Sign,
    SignAndEncrypt,
}

/// 一组可用的策略/模式组合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityBinding {
    pub policy: SecurityPolicy,
    pub mode: MessageSecurityMode,
}

/// 用户认证方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    Anonymous,
    UserName,
    Certificate,
}

/// 协议汇配置（外部协议服务只暴露这些配置项）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolSinkConfig {
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 本机主机名，用于第三个端点
    #[serde(default = "default_hostname")]
    pub hostname: String,
    /// 变量分组数
    #[serde(default = "default_num_groups")]
    pub num_groups: u32,
    /// 启用的安全组合
    #[serde(default = "default_security_matrix")]
    pub security: Vec<SecurityBinding>,
    /// 启用的认证方式
    #[serde(default = "default_auth_modes")]
    pub auth_modes: Vec<AuthMode>,
}

fn default_port() -> u16 {
    49320
}

fn default_hostname() -> String {
    "localhost".to_string()
}

fn default_num_groups() -> u32 {
    10
}

fn default_auth_modes() -> Vec<AuthMode> {
    vec![AuthMode::Anonymous, AuthMode::UserName, AuthMode::Certificate]
}

/// 默认安全矩阵：None/None 加上各签名策略的 Sign 与 SignAndEncrypt
pub fn default_security_matrix() -> Vec<SecurityBinding> {
    let mut bindings = vec![SecurityBinding {
        policy: SecurityPolicy::None,
        mode: MessageSecurityMode::None,
    }];
    for policy in [
        SecurityPolicy::Basic128Rsa15,
        SecurityPolicy::Basic256,
        SecurityPolicy::Basic256Sha256,
        SecurityPolicy::Aes128Sha256RsaOaep,
        SecurityPolicy::Aes256Sha256RsaPss,
    ] {
        for mode in [MessageSecurityMode::Sign, MessageSecurityMode::SignAndEncrypt] {
            bindings.push(SecurityBinding { policy, mode });
        }
    }
    bindings
}

impl Default for ProtocolSinkConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            hostname: default_hostname(),
            num_groups: default_num_groups(),
            security: default_security_matrix(),
            auth_modes: default_auth_modes(),
        }
    }
}

impl ProtocolSinkConfig {
    /// 监听端点：通配地址、localhost、本机主机名（去重）
    pub fn endpoints(&self) -> Vec<String> {
        let mut hosts = vec!["0.0.0.0", "localhost"];
        if !hosts.contains(&self.hostname.as_str()) {
            hosts.push(self.hostname.as_str());
        }
        hosts
            .into_iter()
            .map(|host| format!("{}:{}", host, self.port))
            .collect()
    }
}

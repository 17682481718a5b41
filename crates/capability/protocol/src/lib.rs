//! # 协议变量能力模块
//!
//! 接收变量更新并转发给外部协议汇，同时按秒统计更新速率。
//!
//! ## 架构设计
//!
//! ```text
//! Router ("opcua" 事件)
//!       │
//!       ▼
//! VariableStore ──计数──▶ PacketCounter ◀──每秒读取清零── 速率监控任务
//!       │                                                    │
//!       ▼                                                    ▼
//! ProtocolSink（外部协议服务）                   RateObservation 广播
//! ```
//!
//! ## 配置格式
//!
//! ```json
//! { "port": 49320, "hostname": "gw-01", "num_groups": 10,
//!   "auth_modes": ["anonymous", "user_name", "certificate"] }
//! ```

mod error;
mod sink;
mod store;
mod types;

pub use error::ProtocolError;
pub use sink::{LoggingProtocolSink, ProtocolSink};
pub use store::{
    PacketCounter, RateObservation, VariableStore, VariableStoreConfig, observe_rate,
};
pub use types::*;

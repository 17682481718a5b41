//! 组件生命周期状态机：Stopped → Starting → Running → Stopping → Stopped。

use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// 生命周期守卫。
///
/// 锁只在状态迁移的瞬间持有，不跨越 await。
#[derive(Debug)]
pub struct Lifecycle {
    state: Mutex<LifecycleState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LifecycleState::Stopped),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    /// Stopped → Starting；其他状态返回 false。
    pub fn begin_start(&self) -> bool {
        self.transition(LifecycleState::Stopped, LifecycleState::Starting)
    }

    /// Starting → Running。
    pub fn finish_start(&self) {
        self.transition(LifecycleState::Starting, LifecycleState::Running);
    }

    /// 启动失败：Starting → Stopped。
    pub fn abort_start(&self) {
        self.transition(LifecycleState::Starting, LifecycleState::Stopped);
    }

    /// Running → Stopping；其他状态返回 false（停止为空操作）。
    pub fn begin_stop(&self) -> bool {
        self.transition(LifecycleState::Running, LifecycleState::Stopping)
    }

    /// Stopping → Stopped。
    pub fn finish_stop(&self) {
        self.transition(LifecycleState::Stopping, LifecycleState::Stopped);
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> bool {
        let mut state = self.lock();
        if *state != from {
            return false;
        }
        *state = to;
        true
    }

    fn lock(&self) -> MutexGuard<'_, LifecycleState> {
        // 临界区内没有可能 panic 的代码，中毒时直接取回状态
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

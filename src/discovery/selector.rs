//! 负载均衡模块
//!
//! 从多个同等可用的实例中选择一个

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// 负载均衡策略
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalanceStrategy {
    /// 均匀随机
    #[default]
    Random,
    /// 轮询
    RoundRobin,
}

impl std::str::FromStr for LoadBalanceStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "random" => Ok(LoadBalanceStrategy::Random),
            "round_robin" | "roundrobin" => Ok(LoadBalanceStrategy::RoundRobin),
            _ => Err(format!("Unknown load balance strategy: {}", s)),
        }
    }
}

/// 实例选择器
pub struct InstanceSelector {
    strategy: LoadBalanceStrategy,
    round_robin_index: AtomicUsize,
}

impl InstanceSelector {
    pub fn new(strategy: LoadBalanceStrategy) -> Self {
        Self {
            strategy,
            round_robin_index: AtomicUsize::new(0),
        }
    }

    pub fn strategy(&self) -> LoadBalanceStrategy {
        self.strategy
    }

    /// 选择一个候选项；候选为空时返回 `None`
    pub fn select<'a, T>(&self, candidates: &'a [T]) -> Option<&'a T> {
        if candidates.is_empty() {
            return None;
        }

        match self.strategy {
            LoadBalanceStrategy::Random => {
                let index = rand::thread_rng().gen_range(0..candidates.len());
                candidates.get(index)
            }
            LoadBalanceStrategy::RoundRobin => {
                let index = self.round_robin_index.fetch_add(1, Ordering::Relaxed);
                candidates.get(index % candidates.len())
            }
        }
    }
}

impl Default for InstanceSelector {
    fn default() -> Self {
        Self::new(LoadBalanceStrategy::Random)
    }
}

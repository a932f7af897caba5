//! 日期切换管理
//!
//! 通过一个持久化的日期标记检测跨日，在每次跨日时恰好重置一次排队引擎。
//! 检查点：进程启动（必须）以及主循环的每次迭代（可选）。

use crate::queue::QueueEngine;
use chrono::NaiveDate;
use clinic_core::{Clock, Result};
use clinic_store::MarkerStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// 标记与今天比较的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleDecision {
    /// 没有标记：首次运行
    FirstRun,
    /// 标记就是今天
    SameDay,
    /// 标记与今天不同；`backward` 表示标记晚于今天（时钟回拨）
    Rollover {
        previous: NaiveDate,
        today: NaiveDate,
        backward: bool,
    },
}

/// 一次检查的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleOutcome {
    FirstRun {
        today: NaiveDate,
    },
    Unchanged {
        today: NaiveDate,
    },
    Rollover {
        previous: NaiveDate,
        today: NaiveDate,
        backward: bool,
        cleared_waiting: usize,
        cleared_called: usize,
    },
}

impl CycleOutcome {
    pub fn is_rollover(&self) -> bool {
        matches!(self, Self::Rollover { .. })
    }

    pub fn today(&self) -> NaiveDate {
        match self {
            Self::FirstRun { today } | Self::Unchanged { today } | Self::Rollover { today, .. } => {
                *today
            }
        }
    }

    /// 面向操作员的提示，只有跨日时才有
    pub fn notice(&self) -> Option<String> {
        match self {
            Self::Rollover {
                previous,
                today,
                backward,
                cleared_waiting,
                cleared_called,
            } => {
                let mut notice = format!(
                    "Date changed from {} to {}: the daily queue has been reset ({} waiting, {} called cleared).",
                    previous, today, cleared_waiting, cleared_called
                );
                if *backward {
                    notice.push_str(" Warning: the system date moved backwards, check the clock.");
                }
                Some(notice)
            }
            _ => None,
        }
    }
}

/// 日期切换管理器
#[derive(Debug)]
pub struct DailyCycleManager<M, C> {
    marker: M,
    clock: C,
}

impl<M, C> DailyCycleManager<M, C>
where
    M: MarkerStore,
    C: Clock,
{
    pub fn new(marker: M, clock: C) -> Self {
        Self { marker, clock }
    }

    /// 纯比较：任何不相等都视为跨日，不假设日期单调递增
    pub fn evaluate(marker: Option<NaiveDate>, today: NaiveDate) -> CycleDecision {
        match marker {
            None => CycleDecision::FirstRun,
            Some(previous) if previous == today => CycleDecision::SameDay,
            Some(previous) => CycleDecision::Rollover {
                previous,
                today,
                backward: previous > today,
            },
        }
    }

    /// 读取-比较-写入
    ///
    /// 标记读取失败按首次运行处理。跨日时先重置引擎，最后写入新标记，
    /// 因此同一次跨日重复检查只会重置一次。
    pub async fn check<I>(&self, queue: &mut QueueEngine<I>) -> Result<CycleOutcome>
    where
        I: Clone + PartialEq,
    {
        let today = self.clock.today();

        let marker = match self.marker.load().await {
            Ok(marker) => marker,
            Err(e) => {
                warn!("Cycle marker unreadable, treating as first run: {}", e);
                None
            }
        };

        match Self::evaluate(marker, today) {
            CycleDecision::FirstRun => {
                self.marker.store(today).await?;
                info!("No cycle marker found, starting cycle at {}", today);
                Ok(CycleOutcome::FirstRun { today })
            }
            CycleDecision::SameDay => {
                debug!("Cycle marker matches {}", today);
                Ok(CycleOutcome::Unchanged { today })
            }
            CycleDecision::Rollover {
                previous,
                today,
                backward,
            } => {
                if backward {
                    warn!(
                        "Cycle marker {} is later than today {}, resetting anyway",
                        previous, today
                    );
                }

                let cleared_waiting = queue.waiting_len();
                let cleared_called = queue.called_len();
                queue.reset();
                self.marker.store(today).await?;

                info!(
                    "Daily rollover {} -> {}: cleared {} waiting and {} called",
                    previous, today, cleared_waiting, cleared_called
                );
                Ok(CycleOutcome::Rollover {
                    previous,
                    today,
                    backward,
                    cleared_waiting,
                    cleared_called,
                })
            }
        }
    }

    pub fn marker_store(&self) -> &M {
        &self.marker
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

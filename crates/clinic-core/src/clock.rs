//! 时钟抽象
//!
//! 日期切换检测和时间戳记录都通过 `Clock` 读取当前时间，便于测试中固定日期。

use chrono::{Local, NaiveDate, NaiveDateTime};
use std::sync::Mutex;

/// 时钟接口
pub trait Clock: Send + Sync {
    /// 当前本地日期（不含时间）
    fn today(&self) -> NaiveDate {
        self.now().date()
    }

    /// 当前本地时间
    fn now(&self) -> NaiveDateTime;
}

/// 系统本地时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// 固定时钟，可手动调整
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// 以某天的 08:00 创建
    pub fn on(date: NaiveDate) -> Self {
        Self::new(date.and_hms_opt(8, 0, 0).unwrap_or_default())
    }

    pub fn set(&self, now: NaiveDateTime) {
        match self.now.lock() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }

    /// 切换到另一天，保留当前时刻
    pub fn set_date(&self, date: NaiveDate) {
        let time = self.now().time();
        self.set(date.and_time(time));
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }

    fn today(&self) -> NaiveDate {
        (**self).today()
    }
}

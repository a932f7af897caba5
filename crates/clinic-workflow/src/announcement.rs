//! 叫号播报
//!
//! 叫号后通知候诊区。语音合成不在本模块范围内，默认实现只写日志。

use clinic_core::utils::format_queue_number;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// 一次叫号播报
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub queue_number: u32,
    pub name: String,
    pub service_point: String,
    pub repeat: bool, // 重复叫号
}

impl Announcement {
    /// 播报文本
    pub fn message(&self) -> String {
        let prefix = if self.repeat { "Repeat call: " } else { "" };
        format!(
            "{}Queue number {}, {}, please proceed to {}.",
            prefix,
            format_queue_number(self.queue_number),
            self.name,
            self.service_point
        )
    }
}

/// 播报接口
pub trait Announcer: Send + Sync {
    fn announce(&self, announcement: &Announcement);
}

/// 写入日志的播报器
#[derive(Debug, Default, Clone)]
pub struct TracingAnnouncer;

impl Announcer for TracingAnnouncer {
    fn announce(&self, announcement: &Announcement) {
        tracing::info!(
            queue_number = announcement.queue_number,
            repeat = announcement.repeat,
            "{}",
            announcement.message()
        );
    }
}

/// 不做任何事的播报器（关闭播报时使用）
#[derive(Debug, Default, Clone)]
pub struct SilentAnnouncer;

impl Announcer for SilentAnnouncer {
    fn announce(&self, _announcement: &Announcement) {}
}

/// 记录所有播报，供测试检查
#[derive(Debug, Default)]
pub struct RecordingAnnouncer {
    announcements: Mutex<Vec<Announcement>>,
}

impl RecordingAnnouncer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn announcements(&self) -> Vec<Announcement> {
        match self.announcements.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Announcer for RecordingAnnouncer {
    fn announce(&self, announcement: &Announcement) {
        let mut guard = match self.announcements.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push(announcement.clone());
    }
}

impl<A: Announcer + ?Sized> Announcer for std::sync::Arc<A> {
    fn announce(&self, announcement: &Announcement) {
        (**self).announce(announcement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(repeat: bool) -> Announcement {
        Announcement {
            queue_number: 7,
            name: "Budi".to_string(),
            service_point: "Room 1".to_string(),
            repeat,
        }
    }

    #[test]
    fn test_message() {
        assert_eq!(
            sample(false).message(),
            "Queue number 007, Budi, please proceed to Room 1."
        );
        assert!(sample(true).message().starts_with("Repeat call: "));
    }

    #[test]
    fn test_recording_announcer() {
        let announcer = RecordingAnnouncer::new();
        announcer.announce(&sample(false));
        announcer.announce(&sample(true));

        let recorded = announcer.announcements();
        assert_eq!(recorded.len(), 2);
        assert!(recorded[1].repeat);
    }
}

//! # 诊所工作流模块
//!
//! 提供诊所当日排队与就诊流程管理功能，包括：
//! - 排队引擎：等候与已叫号两个有序序列
//! - 就诊状态机：管理当日就诊记录的状态流转
//! - 日期切换管理：跨日时恰好重置一次队列
//! - 排队看板：把队列与存储记录关联成可展示的行
//! - 工作流引擎：操作台命令的唯一入口

pub mod announcement;
pub mod board;
pub mod command;
pub mod daily_cycle;
pub mod engine;
pub mod queue;
pub mod state_machine;

// 重新导出主要类型
pub use announcement::{
    Announcement, Announcer, RecordingAnnouncer, SilentAnnouncer, TracingAnnouncer,
};
pub use board::{BoardRow, DaySnapshot, QueueOverview};
pub use command::{CommandOutcome, QueueCommand};
pub use daily_cycle::{CycleDecision, CycleOutcome, DailyCycleManager};
pub use engine::{ClinicWorkflow, WorkflowSettings};
pub use queue::QueueEngine;
pub use state_machine::{VisitEvent, VisitStateMachine};

//! # 患者存储模块
//!
//! 负责患者主档案、每日就诊记录和日期标记的持久化。所有访问都是
//! "整表读取、修改、整表写回"，调用方不能假设两次调用之间的原子性。

pub mod csv_store;
pub mod marker;
pub mod memory;
pub mod models;
pub mod store;

// 重新导出主要类型
pub use csv_store::CsvPatientStore;
pub use marker::{FileMarkerStore, InMemoryMarkerStore};
pub use memory::InMemoryPatientStore;
pub use store::{MarkerStore, PatientStore};

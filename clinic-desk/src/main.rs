//! 诊所排队操作台主程序

mod console;
mod menu;

use anyhow::{Context, Result};
use clap::Parser;
use clinic_admin::{init_logging, ConfigManager};
use clinic_core::SystemClock;
use clinic_store::{CsvPatientStore, FileMarkerStore};
use clinic_workflow::{ClinicWorkflow, SilentAnnouncer, WorkflowSettings};
use console::Console;
use menu::Desk;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// 操作台命令行参数
#[derive(Parser, Debug)]
#[command(name = "clinic-desk")]
#[command(about = "Walk-in clinic queue desk")]
struct Args {
    /// 配置文件路径 (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 数据目录，覆盖配置中的 storage.data_dir
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// 日志级别，覆盖配置中的 logging.level
    #[arg(short, long)]
    log_level: Option<String>,

    /// 把生效的配置写入指定文件后退出
    #[arg(long)]
    write_config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut manager = ConfigManager::load(args.config.as_deref())?;
    manager.apply_overrides(args.data_dir, args.log_level)?;
    let config = manager.config().clone();

    // 初始化日志
    init_logging(&config.logging)?;

    if let Some(path) = args.write_config {
        manager.save(&path)?;
        println!("Configuration written to {}", path.display());
        return Ok(());
    }

    info!("Starting clinic desk");
    info!("  Data directory: {}", config.storage.data_dir.display());

    let store = CsvPatientStore::new(
        config.storage.patients_path(),
        config.storage.visits_path(),
    );
    let marker = FileMarkerStore::new(config.storage.marker_path());
    let settings = WorkflowSettings {
        default_department: config.queue.default_department.clone(),
        service_point: config.queue.service_point.clone(),
    };

    let mut workflow =
        ClinicWorkflow::new(store, marker, Arc::new(SystemClock)).with_settings(settings);
    if !config.announcement.enabled {
        workflow = workflow.with_announcer(SilentAnnouncer);
    }

    let outcome = workflow
        .bootstrap()
        .await
        .context("Failed to restore today's queue")?;
    if let Some(notice) = outcome.notice() {
        println!("\n{}", notice);
    }

    let mut desk = Desk::new(
        workflow,
        Console::new(tokio::io::stdin()),
        config.queue.check_rollover_each_loop,
    );
    desk.run().await?;

    info!("Clinic desk stopped");
    Ok(())
}

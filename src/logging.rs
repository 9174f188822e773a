// ==========================================
// 日志系统初始化
// ==========================================
// tracing + tracing-subscriber, EnvFilter 控制级别
// 核算引擎以结构化字段输出（snapshot_id / bom_id / product_id）
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 初始化日志系统（进程入口调用一次）
///
/// 级别经 RUST_LOG 控制，默认 info。排查单轮核算时常用:
/// `RUST_LOG=bom_costing::engine=debug` 只放开引擎层，
/// 环截断的 warn 与快照替换的 debug 都在这里输出。
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();
}

/// 测试用初始化: debug 级别 + 测试捕获输出，可重复调用
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

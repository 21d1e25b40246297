//! 可观测性：tracing 订阅器初始化
//!
//! 日志写 stderr，stdout 留给一次性运行器输出 JSON 结果。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 初始化全局订阅器；RUST_LOG 未设置时默认 info。重复调用无副作用
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

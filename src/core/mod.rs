//! 核心基础层模块
//!
//! 提供运行时的基础设施：共享工作线程池

pub mod worker_pool;

// 重新导出核心组件
pub use worker_pool::*;

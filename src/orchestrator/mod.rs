//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层持有会话状态并驱动整个批改流程，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 连接浏览器、创建 JsExecutor
//! - 组装页面访问、推理服务和展示层
//! - 监听退出信号
//!
//! ### `grading_loop` - 批改状态机
//! - Idle → Reading → Querying → Displaying 的阶段流转
//! - 处理用户操作、延时任务到期和看门狗检查
//! - 错误统一提示并回到 Idle
//!
//! ### `session` - 会话状态
//! - 唯一的可变状态，展示层只能拿到只读投影
//!
//! ### `scheduler` / `watchdog` - 定时
//! - 同一时间最多一个待执行的延时任务
//! - 固定间隔的页面地址检查
//!
//! ## 层次关系
//!
//! ```text
//! app (资源与生命周期)
//!     ↓
//! grading_loop (单份提交的流程 + 自动翻页)
//!     ↓
//! page / services / presentation (能力层：读写页面 / 模型批改 / 面板)
//!     ↓
//! infrastructure (基础设施：JsExecutor)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单线程协作**：事件逐个处理，状态只在编排层修改
//! 2. **资源隔离**：只有编排层持有 Browser
//! 3. **向下依赖**：编排层 → 能力层 → infrastructure

pub mod app;
pub mod grading_loop;
pub mod scheduler;
pub mod session;
pub mod watchdog;

// 重新导出主要类型
pub use app::App;
pub use grading_loop::GradingOrchestrator;
pub use scheduler::{Scheduler, TimerFired, TimerKind};
pub use session::{LocationChange, ResetReason, Session};
pub use watchdog::Watchdog;

//! # Homework Grader
//!
//! 连接浏览器中的批改页面，读取评分细则和学生提交的图片，请模型逐项判定后自动写入评分并翻到下一份
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() 能力
//!
//! ### ② 业务能力层
//! - `page/` - 读写宿主页面：提交图片、评分项、评分开关、“下一份”按钮
//! - `services/` - 提示词构建、模型调用和严格的结果解析
//! - `presentation/` - 页面内控制面板和日志输出
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/grading_loop` - 批改状态机
//! - `orchestrator/app` - 资源管理和生命周期
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod page;
pub mod presentation;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use browser::connect_to_browser_and_page;
pub use config::Config;
pub use error::{ErrorKind, GradingError, GradingResult};
pub use infrastructure::JsExecutor;
pub use models::{Decision, EvaluationResult, Phase, RubricItem, SubmissionImage};
pub use orchestrator::{App, GradingOrchestrator};

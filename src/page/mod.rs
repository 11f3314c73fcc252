//! 页面访问 - 宿主页面的读写能力
//!
//! 宿主页面随时可能自己改动 DOM、跳转或禁用按钮，所以每次调用都重新查询，
//! 不在两次调用之间保留任何状态。

pub mod cdp;

pub use cdp::CdpPageAccessor;

use crate::error::PageError;
use crate::models::{RubricItem, SubmissionImage};
use async_trait::async_trait;

/// “下一份”按钮的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextControl {
    pub enabled: bool,
}

/// 宿主页面的读写能力
///
/// 所有操作要么完整成功，要么返回带分类的错误，不返回部分结果
#[async_trait]
pub trait PageAccessor: Send + Sync {
    /// 定位提交图片：恰好一个容器，容器内恰好一张图片
    async fn locate_submission_image(&self) -> Result<SubmissionImage, PageError>;

    /// 读取评分项：至少一个，每项恰好一个分值按钮和一个描述
    async fn locate_rubric_items(&self) -> Result<Vec<RubricItem>, PageError>;

    /// 定位“下一份”按钮
    async fn locate_next_control(&self) -> Result<NextControl, PageError>;

    /// 当前页面上评分开关的数量
    async fn count_item_controls(&self) -> Result<usize, PageError>;

    /// 把第 `index` 个评分项设置为 `applied`
    ///
    /// 先读取当前状态，只有不一致时才点击一次；返回是否发生了点击
    async fn set_item_applied(&self, index: usize, applied: bool) -> Result<bool, PageError>;

    /// 点击“下一份”按钮
    async fn activate_next_control(&self) -> Result<(), PageError>;

    /// 当前页面地址
    async fn current_location(&self) -> Result<String, PageError>;
}

use std::fmt;

/// 批改流程所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// 等待用户输入密钥并开始
    #[default]
    Idle,
    /// 等待页面稳定后读取提交图片和评分项
    Reading,
    /// 等待模型返回结果
    Querying,
    /// 展示结果，随后自动写入评分并跳转
    Displaying,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Reading => "reading",
            Phase::Querying => "querying",
            Phase::Displaying => "displaying",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

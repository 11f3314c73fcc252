//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"执行 JS"的能力

use crate::error::PageError;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::trace;

/// JS 执行器
///
/// 职责：
/// - 持有 Page 资源（Page 本身可廉价克隆，页面访问和面板共用同一个标签页）
/// - 暴露 eval() 能力
/// - 不认识评分项 / 批改结果
#[derive(Clone)]
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    ///
    /// 表达式返回 Promise 时会等待其完成
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue, PageError> {
        let js_code = js_code.into();
        trace!("执行脚本: {} 字符", js_code.len());
        let result = self.page.evaluate(js_code).await?;
        Ok(result.into_value()?)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        js_code: impl Into<String>,
    ) -> Result<T, PageError> {
        let json_value = self.eval(js_code).await?;
        Ok(serde_json::from_value(json_value)?)
    }
}

/// 把 Rust 值转成可以直接拼进脚本的 JS 字面量
pub fn js_literal<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_literal_escapes_strings() {
        assert_eq!(js_literal("pv--viewport"), r#""pv--viewport""#);
        assert_eq!(js_literal(r#"a"b</script>"#), r#""a\"b</script>""#);
        assert_eq!(js_literal(&3usize), "3");
        assert_eq!(js_literal(&true), "true");
    }
}

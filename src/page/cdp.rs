//! 基于 CDP 的页面访问实现
//!
//! 每个操作都是一段自包含的脚本，统一返回 `{ status, ... }` 结构，
//! 数量校验在页面内完成，分值解析在 Rust 侧完成。

use super::{NextControl, PageAccessor};
use crate::config::Selectors;
use crate::error::PageError;
use crate::infrastructure::{js_literal, JsExecutor};
use crate::models::{parse_points, RubricItem, SubmissionImage};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

/// 页面脚本的返回结构
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum ScriptReply<T> {
    Ok { value: T },
    Ambiguous { target: String, found: usize },
    Empty,
    Missing { index: usize, found: usize },
    Disabled,
    FetchFailed { message: String },
    Failed { message: String },
}

impl<T> ScriptReply<T> {
    fn into_result(self) -> Result<T, PageError> {
        match self {
            ScriptReply::Ok { value } => Ok(value),
            ScriptReply::Ambiguous { target, found } => Err(PageError::Ambiguous { target, found }),
            ScriptReply::Empty => Err(PageError::NoRubricItems),
            ScriptReply::Missing { index, found } => Err(PageError::ControlMissing { index, found }),
            ScriptReply::Disabled => Err(PageError::NextDisabled),
            ScriptReply::FetchFailed { message } => Err(PageError::ImageFetch { message }),
            ScriptReply::Failed { message } => Err(PageError::Script { message }),
        }
    }
}

/// 评分项的原始文本
#[derive(Debug, Deserialize)]
struct RawRubricRow {
    label: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct RawNextControl {
    enabled: bool,
}

/// CDP 页面访问器
pub struct CdpPageAccessor {
    executor: JsExecutor,
    selectors: Selectors,
    inline_image: bool,
}

impl CdpPageAccessor {
    pub fn new(executor: JsExecutor, selectors: Selectors) -> Self {
        Self {
            executor,
            selectors,
            inline_image: false,
        }
    }

    /// 在页面内把图片转成 data URL（沿用宿主页面的登录态）
    pub fn with_inline_image(mut self, inline_image: bool) -> Self {
        self.inline_image = inline_image;
        self
    }

    async fn run<T: DeserializeOwned>(&self, script: String) -> Result<T, PageError> {
        let reply: ScriptReply<T> = self.executor.eval_as(script).await?;
        reply.into_result()
    }

    async fn fetch_as_data_url(&self, src: &str) -> Result<String, PageError> {
        let script = format!(
            r#"
            (async () => {{
                try {{
                    const res = await fetch({src}, {{ credentials: "include" }});
                    if (!res.ok) {{
                        return {{ status: "fetch_failed", message: `HTTP ${{res.status}}` }};
                    }}
                    const blob = await res.blob();
                    const dataUrl = await new Promise((resolve, reject) => {{
                        const reader = new FileReader();
                        reader.onloadend = () => resolve(reader.result);
                        reader.onerror = () => reject(reader.error);
                        reader.readAsDataURL(blob);
                    }});
                    return {{ status: "ok", value: dataUrl }};
                }} catch (err) {{
                    return {{ status: "fetch_failed", message: `${{err}}` }};
                }}
            }})()
            "#,
            src = js_literal(src),
        );
        self.run(script).await
    }
}

#[async_trait]
impl PageAccessor for CdpPageAccessor {
    async fn locate_submission_image(&self) -> Result<SubmissionImage, PageError> {
        let script = format!(
            r#"
            (() => {{
                const viewports = document.getElementsByClassName({viewport});
                if (viewports.length !== 1) {{
                    return {{ status: "ambiguous", target: "提交图片容器", found: viewports.length }};
                }}
                const images = viewports[0].getElementsByTagName("img");
                if (images.length !== 1) {{
                    return {{ status: "ambiguous", target: "提交图片", found: images.length }};
                }}
                return {{ status: "ok", value: images[0].src }};
            }})()
            "#,
            viewport = js_literal(&self.selectors.viewport_class),
        );

        let src: String = self.run(script).await?;
        if src.is_empty() {
            return Err(PageError::ambiguous("提交图片地址", 0));
        }
        debug!("提交图片: {}", crate::utils::truncate_text(&src, 80));

        if self.inline_image && !src.starts_with("data:") {
            let data_url = self.fetch_as_data_url(&src).await?;
            debug!("图片已转为 data URL ({} 字符)", data_url.len());
            return Ok(SubmissionImage::new(data_url));
        }

        Ok(SubmissionImage::new(src))
    }

    async fn locate_rubric_items(&self) -> Result<Vec<RubricItem>, PageError> {
        let script = format!(
            r#"
            (() => {{
                const items = document.getElementsByClassName({item});
                if (items.length === 0) {{
                    return {{ status: "empty" }};
                }}
                const rows = [];
                for (let i = 0; i < items.length; i++) {{
                    const controls = items[i].getElementsByTagName({tag});
                    if (controls.length !== 1) {{
                        return {{ status: "ambiguous", target: `第 ${{i + 1}} 个评分项的分值按钮`, found: controls.length }};
                    }}
                    const descriptions = items[i].getElementsByClassName({description});
                    if (descriptions.length !== 1) {{
                        return {{ status: "ambiguous", target: `第 ${{i + 1}} 个评分项的描述`, found: descriptions.length }};
                    }}
                    rows.push({{
                        label: controls[0].textContent || "",
                        description: (descriptions[0].textContent || "").trim(),
                    }});
                }}
                return {{ status: "ok", value: rows }};
            }})()
            "#,
            item = js_literal(&self.selectors.rubric_item_class),
            tag = js_literal(&self.selectors.point_control_tag),
            description = js_literal(&self.selectors.description_class),
        );

        let rows: Vec<RawRubricRow> = self.run(script).await?;
        rubric_from_rows(rows)
    }

    async fn locate_next_control(&self) -> Result<NextControl, PageError> {
        let script = format!(
            r#"
            (() => {{
                const controls = document.getElementsByClassName({next});
                if (controls.length !== 1) {{
                    return {{ status: "ambiguous", target: "“下一份”按钮", found: controls.length }};
                }}
                const control = controls[0];
                const enabled = !control.disabled && control.getAttribute("aria-disabled") !== "true";
                return {{ status: "ok", value: {{ enabled }} }};
            }})()
            "#,
            next = js_literal(&self.selectors.next_control_class),
        );

        let raw: RawNextControl = self.run(script).await?;
        Ok(NextControl {
            enabled: raw.enabled,
        })
    }

    async fn count_item_controls(&self) -> Result<usize, PageError> {
        let script = format!(
            r#"({{ status: "ok", value: document.getElementsByClassName({key}).length }})"#,
            key = js_literal(&self.selectors.item_control_class),
        );
        self.run(script).await
    }

    async fn set_item_applied(&self, index: usize, applied: bool) -> Result<bool, PageError> {
        let script = format!(
            r#"
            (() => {{
                const keys = document.getElementsByClassName({key});
                const index = {index};
                if (index >= keys.length) {{
                    return {{ status: "missing", index, found: keys.length }};
                }}
                const pressed = keys[index].getAttribute("aria-pressed") === "true";
                if (pressed === {applied}) {{
                    return {{ status: "ok", value: false }};
                }}
                keys[index].click();
                return {{ status: "ok", value: true }};
            }})()
            "#,
            key = js_literal(&self.selectors.item_control_class),
            index = index,
            applied = js_literal(&applied),
        );
        self.run(script).await
    }

    async fn activate_next_control(&self) -> Result<(), PageError> {
        let script = format!(
            r#"
            (() => {{
                const controls = document.getElementsByClassName({next});
                if (controls.length !== 1) {{
                    return {{ status: "ambiguous", target: "“下一份”按钮", found: controls.length }};
                }}
                if (controls[0].disabled) {{
                    return {{ status: "disabled" }};
                }}
                controls[0].click();
                return {{ status: "ok", value: null }};
            }})()
            "#,
            next = js_literal(&self.selectors.next_control_class),
        );
        self.run::<()>(script).await
    }

    async fn current_location(&self) -> Result<String, PageError> {
        self.run(r#"({ status: "ok", value: window.location.href })"#.to_string())
            .await
    }
}

/// 把原始文本转换成评分项，分值解析失败时整体失败
fn rubric_from_rows(rows: Vec<RawRubricRow>) -> Result<Vec<RubricItem>, PageError> {
    if rows.is_empty() {
        return Err(PageError::NoRubricItems);
    }

    rows.into_iter()
        .enumerate()
        .map(|(index, row)| match parse_points(&row.label) {
            Some(points) => Ok(RubricItem::new(row.description, points)),
            None => {
                warn!("第 {} 个评分项分值无法解析: {:?}", index + 1, row.label);
                Err(PageError::MalformedPoints {
                    index,
                    label: row.label,
                })
            }
        })
        .collect()
}

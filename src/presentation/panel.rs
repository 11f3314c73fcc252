//! 页面内控制面板
//!
//! 面板直接注入宿主页面，按钮点击写入 `window.__hwGraderIntents` 队列，
//! 由 [`pump_intents`] 定时取走并转交编排层。

use super::{PanelView, Presenter, UserIntent};
use crate::infrastructure::{js_literal, JsExecutor};
use crate::models::Phase;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// 面板容器的 id
pub const PANEL_ID: &str = "homework-grader-extension";

const PANEL_STYLE: &str = "position: fixed; bottom: 20px; left: 20px; width: 300px; max-height: 80vh; \
    overflow-y: auto; background-color: white; border: 1px solid #ccc; border-radius: 8px; padding: 15px; \
    box-shadow: 0 4px 8px rgba(0, 0, 0, 0.1); z-index: 10000; font-family: Arial, sans-serif;";

/// 页面内控制面板
pub struct PagePanel {
    executor: JsExecutor,
    last_html: Mutex<Option<String>>,
}

/// 一次队列轮询的结果
#[derive(Debug, Deserialize)]
pub struct PanelPoll {
    pub mounted: bool,
    pub intents: Vec<UserIntent>,
}

impl PagePanel {
    pub fn new(executor: JsExecutor) -> Self {
        Self {
            executor,
            last_html: Mutex::new(None),
        }
    }

    /// 取走页面中积累的用户操作
    pub async fn drain_intents(&self) -> Result<PanelPoll> {
        let script = format!(
            r#"
            (() => {{
                const queue = window.__hwGraderIntents || [];
                window.__hwGraderIntents = [];
                return {{ mounted: !!document.getElementById({id}), intents: queue }};
            }})()
            "#,
            id = js_literal(PANEL_ID),
        );
        Ok(self.executor.eval_as(script).await?)
    }

    /// 页面刷新后面板会消失，重新挂载上一次渲染的内容
    pub async fn remount(&self) -> Result<()> {
        let html = self.last_html.lock().ok().and_then(|guard| guard.clone());
        match html {
            Some(html) => self.mount(&html).await,
            None => Ok(()),
        }
    }

    async fn mount(&self, html: &str) -> Result<()> {
        self.executor.eval(mount_script(html)).await?;
        Ok(())
    }
}

#[async_trait]
impl Presenter for PagePanel {
    async fn render(&self, view: &PanelView<'_>) -> Result<()> {
        let html = render_html(view);
        if let Ok(mut guard) = self.last_html.lock() {
            *guard = Some(html.clone());
        }
        self.mount(&html).await
    }
}

/// 挂载面板并绑定按钮的脚本
///
/// 按钮点击只把操作写入 `window.__hwGraderIntents`，不直接调用 Rust 侧
fn mount_script(html: &str) -> String {
    format!(
        r##"
        (() => {{
            let root = document.getElementById({id});
            if (!root) {{
                root = document.createElement("div");
                root.id = {id};
                root.style.cssText = {style};
                document.body.appendChild(root);
            }}
            window.__hwGraderIntents = window.__hwGraderIntents || [];
            const push = (intent) => window.__hwGraderIntents.push(intent);
            root.innerHTML = {html};
            const start = root.querySelector("#hwg-start-button");
            if (start) {{
                start.addEventListener("click", () => push({{
                    kind: "submit_credential",
                    credential: root.querySelector("#hwg-api-key-input").value,
                    extra_context: root.querySelector("#hwg-extra-context-input").value,
                }}));
            }}
            root.querySelectorAll("[data-hwg-reset]").forEach((button) => {{
                button.addEventListener("click", () => push({{ kind: "reset" }}));
            }});
            return true;
        }})()
        "##,
        id = js_literal(PANEL_ID),
        style = js_literal(PANEL_STYLE),
        html = js_literal(html),
    )
}

/// 定时取走面板中的用户操作并转交编排层
///
/// 编排层关闭接收端后退出
pub async fn pump_intents(panel: Arc<PagePanel>, tx: mpsc::Sender<UserIntent>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if tx.is_closed() {
            break;
        }

        let poll = match panel.drain_intents().await {
            Ok(poll) => poll,
            Err(e) => {
                // 页面跳转过程中脚本可能失败，下一轮再试
                debug!("读取面板操作失败: {}", e);
                continue;
            }
        };

        if !poll.mounted {
            info!("🔁 面板已从页面中消失，重新挂载");
            if let Err(e) = panel.remount().await {
                debug!("重新挂载面板失败: {}", e);
            }
        }

        for intent in poll.intents {
            if tx.send(intent).await.is_err() {
                return;
            }
        }
    }
}

/// 按会话投影生成面板 HTML
pub fn render_html(view: &PanelView<'_>) -> String {
    let mut html = String::from(
        r#"<div style="display: flex; justify-content: space-between; align-items: center; margin-bottom: 15px;">
  <h2 style="margin: 0; font-size: 18px;">作业批改助手</h2>
  <button data-hwg-reset="1" title="重置" style="background: #eee; border-radius: 4px; padding: 3px 6px; font-size: 12px;">↺</button>
</div>"#,
    );

    match view.phase {
        Phase::Idle => html.push_str(&render_idle(view)),
        Phase::Reading => html.push_str(&render_progress("正在读取页面内容...", 50)),
        Phase::Querying => html.push_str(&render_progress("正在请求模型批改...", 75)),
        Phase::Displaying => html.push_str(&render_results(view)),
    }

    html
}

fn render_idle(view: &PanelView<'_>) -> String {
    let mut html = String::new();

    if let Some(notice) = view.notice {
        let color = if notice.is_error() { "#f44336" } else { "#4CAF50" };
        html.push_str(&format!(
            r#"<p style="margin: 0 0 10px; font-size: 12px; color: {};">[{}] {}</p>"#,
            color,
            notice.at.format("%H:%M:%S"),
            escape_html(&notice.text)
        ));
    }

    let key_placeholder = if view.has_saved_credential {
        "留空则使用上次的密钥"
    } else {
        "sk-..."
    };

    html.push_str(&format!(
        r#"<div>
  <p>输入 OpenAI API 密钥后开始批改：</p>
  <input type="password" id="hwg-api-key-input" placeholder="{}" style="width: 100%; padding: 8px; margin-bottom: 10px; border: 1px solid #ccc; border-radius: 4px;" />
  <input type="text" id="hwg-extra-context-input" placeholder="这道题考查的是..." value="{}" style="width: 100%; padding: 8px; margin-bottom: 10px; border: 1px solid #ccc; border-radius: 4px;" />
  <button id="hwg-start-button" style="background-color: #4CAF50; color: white; border: none; padding: 10px 15px; border-radius: 4px; cursor: pointer; width: 100%;">开始批改</button>
</div>"#,
        key_placeholder,
        escape_html(view.extra_context.unwrap_or_default())
    ));

    if view.graded > 0 {
        html.push_str(&format!(
            r#"<p style="margin: 10px 0 0; font-size: 12px; color: #666;">本次已批改 {} 份</p>"#,
            view.graded
        ));
    }

    html
}

fn render_progress(label: &str, percent: u8) -> String {
    format!(
        r#"<div>
  <p>{}</p>
  <div style="width: 100%; height: 4px; background-color: #f3f3f3; border-radius: 4px; overflow: hidden;">
    <div style="width: {}%; height: 100%; background-color: #4CAF50;"></div>
  </div>
</div>"#,
        label, percent
    )
}

fn render_results(view: &PanelView<'_>) -> String {
    let Some(result) = view.result else {
        return "<p>错误：没有可展示的批改结果</p>".to_string();
    };
    let Some(score) = result.score(view.items) else {
        return "<p>错误：批改结果与评分项数量不一致</p>".to_string();
    };

    let mut html = String::from(
        r#"<div><p>批改结果：</p><div style="max-height: 300px; overflow-y: auto; margin-bottom: 15px;">"#,
    );

    for ((item, decision), line) in view.items.iter().zip(&result.decisions).zip(&score.lines) {
        let (background, decoration, weight) = if decision.applied {
            ("#e6f7e6", "none", "bold")
        } else {
            ("#fff", "line-through", "normal")
        };
        html.push_str(&format!(
            r#"<div style="padding: 8px; margin-bottom: 8px; border: 1px solid #ddd; border-radius: 4px; background-color: {};">
  <div style="display: flex; justify-content: space-between;">
    <span style="font-weight: {}; text-decoration: {};">{}</span>
    <span>{} / {} 分</span>
  </div>"#,
            background,
            weight,
            decoration,
            escape_html(&item.description),
            line.awarded,
            line.possible
        ));
        if !decision.reason.is_empty() {
            html.push_str(&format!(
                r#"<p style="margin: 5px 0 0; font-size: 12px; color: #666;">{}</p>"#,
                escape_html(&decision.reason)
            ));
        }
        html.push_str("</div>");
    }

    html.push_str(&format!(
        r#"<div style="padding: 8px; border: 1px solid #ddd; border-radius: 4px; background-color: #f9f9f9; margin-bottom: 8px;">
  <h3 style="margin-top: 0; font-size: 14px;">总分：{} / {}</h3>
  <p style="margin: 5px 0 0; font-size: 13px;">{}</p>
</div></div>"#,
        score.awarded,
        score.possible,
        escape_html(&result.overall_feedback)
    ));

    let status = if view.applied {
        "评分已写入，即将跳转下一份..."
    } else {
        "正在写入评分..."
    };
    html.push_str(&format!(
        r#"<div style="display: flex; justify-content: space-between; align-items: center;">
  <p>{}</p>
  <button data-hwg-reset="1" style="background-color: #f44336; color: white; border: none; padding: 8px 12px; border-radius: 4px; cursor: pointer;">停止</button>
</div>
<div style="width: 100%; height: 4px; background-color: #f3f3f3; border-radius: 4px; overflow: hidden;">
  <div style="width: 90%; height: 100%; background-color: #4CAF50;"></div>
</div></div>"#,
        status
    ));

    html
}

/// 转义插入 innerHTML 的文本
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Decision, EvaluationResult, RubricItem};
    use crate::presentation::Notice;

    fn view<'a>(phase: Phase) -> PanelView<'a> {
        PanelView {
            phase,
            items: &[],
            result: None,
            applied: false,
            notice: None,
            has_saved_credential: false,
            extra_context: None,
            graded: 0,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<img src=x onerror="alert('x')">&"#),
            "&lt;img src=x onerror=&quot;alert(&#39;x&#39;)&quot;&gt;&amp;"
        );
    }

    #[test]
    fn test_mount_script_binds_rendered_controls() {
        let html = render_html(&view(Phase::Idle));
        let script = mount_script(&html);

        assert!(script.contains(r#"document.getElementById("homework-grader-extension")"#));
        assert!(script.contains(&format!("root.innerHTML = {};", js_literal(&html))));
        assert!(script.contains("window.__hwGraderIntents.push(intent)"));
        assert!(script.contains(r#"kind: "submit_credential""#));
        assert!(script.contains(r#"kind: "reset""#));

        // 脚本查询的每个元素都要出现在面板 HTML 里
        for id in ["hwg-start-button", "hwg-api-key-input", "hwg-extra-context-input"] {
            assert!(script.contains(&format!("querySelector(\"#{}\")", id)), "{}", id);
            assert!(html.contains(&format!("id=\"{}\"", id)), "{}", id);
        }
        assert!(html.contains("data-hwg-reset"));
    }

    #[test]
    fn test_mount_script_keeps_html_inside_string_literal() {
        let script = mount_script("<p>\"}); alert(1); ({\"</p>");
        assert!(script.contains(r#"root.innerHTML = "<p>\"}); alert(1); ({\"</p>";"#));
    }

    #[test]
    fn test_idle_shows_form_and_notice() {
        let notice = Notice::error("[AmbiguousPage] <b>bad</b>");
        let mut v = view(Phase::Idle);
        v.notice = Some(&notice);
        v.extra_context = Some("Q3 \"limits\"");

        let html = render_html(&v);
        assert!(html.contains("hwg-start-button"));
        assert!(html.contains("[AmbiguousPage] &lt;b&gt;bad&lt;/b&gt;"));
        assert!(html.contains("value=\"Q3 &quot;limits&quot;\""));
        assert!(html.contains("data-hwg-reset"));
    }

    #[test]
    fn test_progress_phases() {
        assert!(render_html(&view(Phase::Reading)).contains("正在读取页面内容"));
        assert!(render_html(&view(Phase::Querying)).contains("正在请求模型批改"));
    }

    #[test]
    fn test_results_show_points_and_total() {
        let items = vec![
            RubricItem::new("Setup", 2),
            RubricItem::new("Algebra", 3),
            RubricItem::new("Answer", 5),
        ];
        let result = EvaluationResult {
            decisions: vec![
                Decision::new(true, "ok"),
                Decision::new(false, "sign error"),
                Decision::new(true, ""),
            ],
            overall_feedback: "Good work".into(),
        };
        let mut v = view(Phase::Displaying);
        v.items = &items;
        v.result = Some(&result);

        let html = render_html(&v);
        assert!(html.contains("2 / 2 分"));
        assert!(html.contains("0 / 3 分"));
        assert!(html.contains("5 / 5 分"));
        assert!(html.contains("总分：7 / 10"));
        assert!(html.contains("Good work"));
        assert!(html.contains("正在写入评分"));

        v.applied = true;
        assert!(render_html(&v).contains("评分已写入"));
    }

    #[test]
    fn test_results_with_maximum_points() {
        let items = vec![RubricItem::new("Full marks", u32::MAX), RubricItem::new("Bonus", 1)];
        let result = EvaluationResult {
            decisions: vec![Decision::new(true, ""), Decision::new(true, "")],
            overall_feedback: String::new(),
        };
        let mut v = view(Phase::Displaying);
        v.items = &items;
        v.result = Some(&result);

        let html = render_html(&v);
        assert!(html.contains("总分：4294967296 / 4294967296"));
    }

    #[test]
    fn test_results_without_data() {
        assert!(render_html(&view(Phase::Displaying)).contains("没有可展示的批改结果"));
    }
}

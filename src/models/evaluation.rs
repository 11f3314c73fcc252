use super::rubric::RubricItem;
use serde::{Deserialize, Serialize};

/// 模型对单个评分项的判定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub applied: bool,
    #[serde(default)]
    pub reason: String,
}

impl Decision {
    pub fn new(applied: bool, reason: impl Into<String>) -> Self {
        Self {
            applied,
            reason: reason.into(),
        }
    }
}

/// 一份提交的批改结果
///
/// `decisions[i]` 对应评分项列表中的第 i 项，长度必须与评分项一致
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub decisions: Vec<Decision>,
    pub overall_feedback: String,
}

/// 单个评分项的得分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreLine {
    pub awarded: u32,
    pub possible: u32,
}

/// 整份提交的得分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Score {
    pub lines: Vec<ScoreLine>,
    /// 总分用 u64 累加，单项分值取到 u32 上限也不会溢出
    pub awarded: u64,
    pub possible: u64,
}

impl EvaluationResult {
    /// 按评分项计算得分
    ///
    /// 两边长度不一致时返回 `None`，不做部分计算
    pub fn score(&self, items: &[RubricItem]) -> Option<Score> {
        if self.decisions.len() != items.len() {
            return None;
        }

        let lines: Vec<ScoreLine> = self
            .decisions
            .iter()
            .zip(items)
            .map(|(decision, item)| ScoreLine {
                awarded: if decision.applied { item.points } else { 0 },
                possible: item.points,
            })
            .collect();

        Some(Score {
            awarded: lines.iter().map(|l| u64::from(l.awarded)).sum(),
            possible: lines.iter().map(|l| u64::from(l.possible)).sum(),
            lines,
        })
    }

    pub fn applied_count(&self) -> usize {
        self.decisions.iter().filter(|d| d.applied).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_example() {
        let items = vec![
            RubricItem::new("a", 2),
            RubricItem::new("b", 3),
            RubricItem::new("c", 5),
        ];
        let result = EvaluationResult {
            decisions: vec![
                Decision::new(true, ""),
                Decision::new(false, ""),
                Decision::new(true, ""),
            ],
            overall_feedback: "Good work".into(),
        };

        let score = result.score(&items).unwrap();
        assert_eq!(
            score.lines,
            vec![
                ScoreLine { awarded: 2, possible: 2 },
                ScoreLine { awarded: 0, possible: 3 },
                ScoreLine { awarded: 5, possible: 5 },
            ]
        );
        assert_eq!((score.awarded, score.possible), (7, 10));
        assert_eq!(result.applied_count(), 2);
    }

    #[test]
    fn test_score_totals_do_not_overflow() {
        let items = vec![RubricItem::new("huge", u32::MAX), RubricItem::new("one", 1)];
        let result = EvaluationResult {
            decisions: vec![Decision::new(true, ""), Decision::new(true, "")],
            overall_feedback: String::new(),
        };

        let score = result.score(&items).unwrap();
        assert_eq!(score.awarded, u64::from(u32::MAX) + 1);
        assert_eq!(score.possible, u64::from(u32::MAX) + 1);
    }

    #[test]
    fn test_score_length_mismatch() {
        let items = vec![RubricItem::new("a", 2)];
        let result = EvaluationResult {
            decisions: vec![],
            overall_feedback: String::new(),
        };
        assert!(result.score(&items).is_none());
    }
}

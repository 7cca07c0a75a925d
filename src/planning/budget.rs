//! Per-event budget: planned vs actual spend by category.

use serde::Serialize;

use crate::crm::BudgetItem;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryLine {
    pub category: String,
    pub planned: f64,
    pub actual: f64,
    /// planned - actual; negative when over budget.
    pub variance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetSummary {
    pub lines: Vec<CategoryLine>,
    pub planned_total: f64,
    pub actual_total: f64,
    pub variance: f64,
    pub over_budget: Vec<String>,
    /// actual / planned as a percentage; `None` when nothing is planned.
    pub percent_used: Option<f64>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Group budget items by category (first-seen order) and total them.
pub fn summarize_budget(items: &[BudgetItem]) -> BudgetSummary {
    let mut lines: Vec<CategoryLine> = Vec::new();
    for item in items {
        let category = if item.category.trim().is_empty() {
            "Uncategorized".to_string()
        } else {
            item.category.trim().to_string()
        };
        match lines.iter_mut().find(|l| l.category == category) {
            Some(line) => {
                line.planned += item.planned;
                line.actual += item.actual;
            }
            None => lines.push(CategoryLine {
                category,
                planned: item.planned,
                actual: item.actual,
                variance: 0.0,
            }),
        }
    }

    for line in &mut lines {
        line.planned = round2(line.planned);
        line.actual = round2(line.actual);
        line.variance = round2(line.planned - line.actual);
    }

    let planned_total = round2(lines.iter().map(|l| l.planned).sum());
    let actual_total = round2(lines.iter().map(|l| l.actual).sum());
    let over_budget = lines
        .iter()
        .filter(|l| l.actual > l.planned)
        .map(|l| l.category.clone())
        .collect();
    let percent_used = if planned_total > 0.0 {
        Some(round2(actual_total / planned_total * 100.0))
    } else {
        None
    };

    BudgetSummary {
        lines,
        planned_total,
        actual_total,
        variance: round2(planned_total - actual_total),
        over_budget,
        percent_used,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(category: &str, planned: f64, actual: f64) -> BudgetItem {
        BudgetItem {
            id: format!("b-{}", category),
            event_id: "e1".to_string(),
            category: category.to_string(),
            planned,
            actual,
        }
    }

    #[test]
    fn groups_by_category_and_flags_overruns() {
        let summary = summarize_budget(&[
            item("Venue", 10_000.0, 9_500.0),
            item("Flowers", 1_000.0, 1_200.0),
            item("Venue", 500.0, 600.0),
        ]);
        assert_eq!(summary.lines.len(), 2);
        assert_eq!(summary.lines[0].planned, 10_500.0);
        assert_eq!(summary.lines[0].variance, 400.0);
        assert_eq!(summary.over_budget, vec!["Flowers"]);
        assert_eq!(summary.planned_total, 11_500.0);
        assert_eq!(summary.actual_total, 11_300.0);
        assert_eq!(summary.percent_used, Some(98.26));
    }

    #[test]
    fn nothing_planned_has_no_percentage() {
        let summary = summarize_budget(&[item("", 0.0, 50.0)]);
        assert_eq!(summary.lines[0].category, "Uncategorized");
        assert!(summary.percent_used.is_none());
        assert_eq!(summary.variance, -50.0);
    }
}

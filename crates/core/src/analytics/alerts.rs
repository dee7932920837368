use crate::domain::metrics::{Alert, AlertOutcome, Severity, SeverityCounts};
use uuid::Uuid;

pub const MAX_ALERTS: usize = 5;

/// What a rule emits; the evaluator attaches the subject id.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertDraft {
    pub severity: Severity,
    pub title: String,
    pub description: String,
}

impl AlertDraft {
    pub fn new(severity: Severity, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            description: description.into(),
        }
    }
}

pub type Rule<M> = fn(&M) -> Option<AlertDraft>;

/// Ordered rule list. Output keeps declaration order and is never re-sorted by severity, so the
/// order decides which alerts survive the cap.
pub struct AlertEvaluator<M> {
    rules: Vec<Rule<M>>,
}

impl<M> AlertEvaluator<M> {
    pub fn new(rules: Vec<Rule<M>>) -> Self {
        Self { rules }
    }

    pub fn evaluate(&self, subject_id: Uuid, metrics: &M) -> AlertOutcome {
        let fired: Vec<Alert> = self
            .rules
            .iter()
            .filter_map(|rule| rule(metrics))
            .map(|draft| Alert {
                severity: draft.severity,
                title: draft.title,
                description: draft.description,
                subject_id,
            })
            .collect();

        let counts = tally(&fired);
        let alerts = fired.into_iter().take(MAX_ALERTS).collect();
        AlertOutcome { alerts, counts }
    }
}

pub fn tally(alerts: &[Alert]) -> SeverityCounts {
    let mut counts = SeverityCounts {
        total: alerts.len(),
        ..SeverityCounts::default()
    };
    for a in alerts {
        match a.severity {
            Severity::Critical => counts.critical += 1,
            Severity::Warning => counts.warning += 1,
            Severity::Info => counts.info += 1,
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Metrics {
        value: i32,
    }

    fn above(n: i32, severity: Severity, m: &Metrics) -> Option<AlertDraft> {
        (m.value > n).then(|| AlertDraft::new(severity, format!("above {n}"), format!("value {}", m.value)))
    }

    fn r0(m: &Metrics) -> Option<AlertDraft> {
        above(0, Severity::Info, m)
    }
    fn r1(m: &Metrics) -> Option<AlertDraft> {
        above(1, Severity::Warning, m)
    }
    fn r2(m: &Metrics) -> Option<AlertDraft> {
        above(2, Severity::Info, m)
    }
    fn r3(m: &Metrics) -> Option<AlertDraft> {
        above(3, Severity::Critical, m)
    }
    fn r4(m: &Metrics) -> Option<AlertDraft> {
        above(4, Severity::Info, m)
    }
    fn r5(m: &Metrics) -> Option<AlertDraft> {
        above(5, Severity::Critical, m)
    }
    fn r6(m: &Metrics) -> Option<AlertDraft> {
        above(6, Severity::Critical, m)
    }

    fn evaluator() -> AlertEvaluator<Metrics> {
        AlertEvaluator::new(vec![r0, r1, r2, r3, r4, r5, r6])
    }

    #[test]
    fn caps_at_five_in_declaration_order() {
        let outcome = evaluator().evaluate(Uuid::nil(), &Metrics { value: 100 });
        let titles: Vec<&str> = outcome.alerts.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["above 0", "above 1", "above 2", "above 3", "above 4"]);
        assert_eq!(outcome.alerts[1].severity, Severity::Warning);
    }

    #[test]
    fn counts_cover_every_fired_rule() {
        let outcome = evaluator().evaluate(Uuid::nil(), &Metrics { value: 100 });
        assert_eq!(outcome.counts.total, 7);
        assert_eq!(outcome.counts.critical, 3);
        assert_eq!(outcome.counts.warning, 1);
        assert_eq!(outcome.counts.info, 3);
    }

    #[test]
    fn quiet_metrics_produce_nothing() {
        let outcome = evaluator().evaluate(Uuid::nil(), &Metrics { value: 0 });
        assert!(outcome.alerts.is_empty());
        assert_eq!(outcome.counts, SeverityCounts::default());
    }

    #[test]
    fn subject_id_is_attached() {
        let id = Uuid::new_v4();
        let outcome = evaluator().evaluate(id, &Metrics { value: 1 });
        assert_eq!(outcome.alerts.len(), 1);
        assert_eq!(outcome.alerts[0].subject_id, id);
    }
}

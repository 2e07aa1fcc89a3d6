//! Conflict and synergy detection between a candidate scenario and the
//! scenarios the user already has active.

use crate::effects::monthly_impact;
use crate::models::{Conflict, ConflictAnalysis, FinancialContext, Scenario, ScenarioType, Severity, Synergy};
use tracing::debug;

/// Share of available income that active commitments may consume
const RESOURCE_THRESHOLD: f64 = 0.8;

/// Types that cannot run alongside `scenario_type` (high severity)
fn conflicting_types(scenario_type: ScenarioType) -> &'static [ScenarioType] {
    match scenario_type {
        ScenarioType::JobChange => &[ScenarioType::JobChange, ScenarioType::CareerBreak],
        ScenarioType::CareerBreak => &[
            ScenarioType::CareerBreak,
            ScenarioType::JobChange,
            ScenarioType::HomePurchase,
        ],
        ScenarioType::HomePurchase => &[ScenarioType::HomePurchase, ScenarioType::CareerBreak],
        ScenarioType::MajorPurchase
        | ScenarioType::DebtPayoff
        | ScenarioType::Investment
        | ScenarioType::EmergencyFund
        | ScenarioType::ExpenseChange => &[],
    }
}

/// Types that compete for the same window (medium severity)
fn timing_partners(scenario_type: ScenarioType) -> &'static [ScenarioType] {
    match scenario_type {
        ScenarioType::HomePurchase => &[ScenarioType::JobChange, ScenarioType::MajorPurchase],
        ScenarioType::JobChange => &[ScenarioType::HomePurchase],
        ScenarioType::MajorPurchase => &[ScenarioType::CareerBreak, ScenarioType::HomePurchase],
        ScenarioType::CareerBreak => &[ScenarioType::MajorPurchase],
        ScenarioType::DebtPayoff
        | ScenarioType::Investment
        | ScenarioType::EmergencyFund
        | ScenarioType::ExpenseChange => &[],
    }
}

/// Types that reinforce `scenario_type`
fn synergy_partners(scenario_type: ScenarioType) -> &'static [ScenarioType] {
    match scenario_type {
        ScenarioType::JobChange => &[ScenarioType::Investment, ScenarioType::DebtPayoff],
        ScenarioType::DebtPayoff => &[ScenarioType::JobChange, ScenarioType::Investment],
        ScenarioType::Investment => &[
            ScenarioType::JobChange,
            ScenarioType::DebtPayoff,
            ScenarioType::EmergencyFund,
        ],
        ScenarioType::EmergencyFund => &[ScenarioType::Investment],
        ScenarioType::CareerBreak
        | ScenarioType::HomePurchase
        | ScenarioType::MajorPurchase
        | ScenarioType::ExpenseChange => &[],
    }
}

fn synergy_description(a: ScenarioType, b: ScenarioType) -> &'static str {
    use ScenarioType::*;

    match (a.min(b), a.max(b)) {
        (JobChange, Investment) => "Higher income can be directed straight into investments",
        (JobChange, DebtPayoff) => "Extra income accelerates debt payoff",
        (DebtPayoff, Investment) => "Freed-up debt payments can roll into investments",
        (Investment, EmergencyFund) => "An emergency fund protects investments from forced sales",
        _ => "Scenarios reinforce each other",
    }
}

/// `100 - 30 per high - 15 per medium`, floored at 0
pub fn compatibility_score(conflicts: &[Conflict]) -> f64 {
    let penalty: f64 = conflicts
        .iter()
        .map(|c| match c.severity {
            Severity::High => 30.0,
            Severity::Medium => 15.0,
            Severity::Low => 0.0,
        })
        .sum();

    (100.0 - penalty).max(0.0)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConflictSynergyAnalyzer;

impl ConflictSynergyAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Compare `candidate` against each of its `existing_scenarios`
    pub fn analyze(&self, candidate: &Scenario, context: &FinancialContext) -> ConflictAnalysis {
        let existing = &candidate.existing_scenarios;
        let mut conflicts = Vec::new();
        let mut synergies = Vec::new();

        for other in existing {
            let pair = vec![candidate.id.clone(), other.id.clone()];

            if conflicting_types(candidate.scenario_type).contains(&other.scenario_type) {
                conflicts.push(Conflict {
                    conflict_type: "type_conflict".to_string(),
                    severity: Severity::High,
                    description: format!(
                        "{} '{}' cannot run alongside {} '{}'",
                        candidate.scenario_type, candidate.name, other.scenario_type, other.name
                    ),
                    scenario_ids: pair.clone(),
                });
            } else if timing_partners(candidate.scenario_type).contains(&other.scenario_type) {
                conflicts.push(Conflict {
                    conflict_type: "timing_conflict".to_string(),
                    severity: Severity::Medium,
                    description: format!(
                        "{} '{}' and {} '{}' compete for the same window",
                        candidate.scenario_type, candidate.name, other.scenario_type, other.name
                    ),
                    scenario_ids: pair.clone(),
                });
            }

            if synergy_partners(candidate.scenario_type).contains(&other.scenario_type) {
                synergies.push(Synergy {
                    synergy_type: format!("{}+{}", candidate.scenario_type, other.scenario_type),
                    description: synergy_description(candidate.scenario_type, other.scenario_type)
                        .to_string(),
                    scenario_ids: pair,
                    impact: "positive".to_string(),
                });
            }
        }

        if let Some(conflict) = resource_conflict(candidate, context) {
            conflicts.push(conflict);
        }

        let recommendations = recommendations(&conflicts, &synergies);
        let compatibility_score = compatibility_score(&conflicts);

        debug!(
            scenario_id = %candidate.id,
            existing = existing.len(),
            conflicts = conflicts.len(),
            synergies = synergies.len(),
            compatibility_score,
            "Conflict analysis complete"
        );

        ConflictAnalysis {
            conflicts,
            synergies,
            compatibility_score,
            recommendations,
        }
    }
}

fn resource_conflict(candidate: &Scenario, context: &FinancialContext) -> Option<Conflict> {
    let committed: f64 = std::iter::once(candidate)
        .chain(candidate.existing_scenarios.iter())
        .map(|s| monthly_impact(s, context).abs())
        .sum();

    let available = context.available_income();
    if committed <= RESOURCE_THRESHOLD * available {
        return None;
    }

    let severity = if committed > available {
        Severity::High
    } else {
        Severity::Medium
    };

    Some(Conflict {
        conflict_type: "resource_conflict".to_string(),
        severity,
        description: format!(
            "Active scenarios commit {:.2}/month against {:.2} available",
            committed, available
        ),
        scenario_ids: std::iter::once(candidate)
            .chain(candidate.existing_scenarios.iter())
            .map(|s| s.id.clone())
            .collect(),
    })
}

fn recommendations(conflicts: &[Conflict], synergies: &[Synergy]) -> Vec<String> {
    let mut out = Vec::with_capacity(conflicts.len() + synergies.len() + 1);

    for conflict in conflicts {
        let advice = match conflict.conflict_type.as_str() {
            "type_conflict" => "Pick one of the conflicting scenarios or run them in sequence",
            "timing_conflict" => "Stagger these scenarios so they do not land in the same months",
            "resource_conflict" => "Reduce monthly commitments or phase scenarios in gradually",
            _ => "Review the overlapping scenarios",
        };
        out.push(format!("{} ({})", advice, conflict.scenario_ids.join(", ")));
    }

    for synergy in synergies {
        out.push(format!("Combine: {}", synergy.description));
    }

    if out.is_empty() {
        out.push("No conflicts detected with existing scenarios".to_string());
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> FinancialContext {
        FinancialContext::new(10_000.0, 8_000.0, 4_000.0)
    }

    fn job(id: &str, salary: f64) -> Scenario {
        Scenario::new(id, format!("Job {}", id), ScenarioType::JobChange)
            .with_param("newSalary", salary)
            .with_param("currentSalary", salary - 100.0)
    }

    #[test]
    fn test_two_job_changes_conflict_high() {
        let candidate = job("a", 7_000.0).with_existing(vec![job("b", 7_500.0)]);
        let analysis = ConflictSynergyAnalyzer::new().analyze(&candidate, &context());

        assert!(analysis
            .conflicts
            .iter()
            .any(|c| c.severity == Severity::High && c.conflict_type == "type_conflict"));
        assert_eq!(analysis.compatibility_score, 70.0);
    }

    #[test]
    fn test_home_purchase_and_job_change_timing() {
        let home = Scenario::new("h", "House", ScenarioType::HomePurchase)
            .with_param("homePrice", 400_000)
            .with_param("downPayment", 80_000)
            .with_param("monthlyPayment", 2_000)
            .with_param("currentRent", 1_600)
            .with_existing(vec![job("j", 6_000.0)]);

        let analysis = ConflictSynergyAnalyzer::new().analyze(&home, &context());
        let timing: Vec<_> = analysis
            .conflicts
            .iter()
            .filter(|c| c.conflict_type == "timing_conflict")
            .collect();

        assert_eq!(timing.len(), 1);
        assert_eq!(timing[0].severity, Severity::Medium);
        assert_eq!(analysis.compatibility_score, 85.0);
    }

    #[test]
    fn test_resource_conflict_over_threshold() {
        // available = 4000, threshold = 3200
        let candidate = Scenario::new("d", "Debt", ScenarioType::DebtPayoff)
            .with_param("monthlyPayment", 2_000)
            .with_existing(vec![Scenario::new("i", "Invest", ScenarioType::Investment)
                .with_param("monthlyContribution", 1_500)]);

        let analysis = ConflictSynergyAnalyzer::new().analyze(&candidate, &context());
        let resource = analysis
            .conflicts
            .iter()
            .find(|c| c.conflict_type == "resource_conflict")
            .expect("resource conflict");

        assert_eq!(resource.severity, Severity::Medium);
        assert_eq!(resource.scenario_ids, vec!["d".to_string(), "i".to_string()]);
        assert_eq!(analysis.synergies.len(), 1);
    }

    #[test]
    fn test_synergy_without_conflicts() {
        let candidate = job("j", 6_000.0).with_existing(vec![Scenario::new(
            "i",
            "Invest",
            ScenarioType::Investment,
        )
        .with_param("monthlyContribution", 200)]);

        let analysis = ConflictSynergyAnalyzer::new().analyze(&candidate, &context());
        assert!(analysis.conflicts.is_empty());
        assert_eq!(analysis.synergies.len(), 1);
        assert_eq!(analysis.synergies[0].impact, "positive");
        assert_eq!(analysis.compatibility_score, 100.0);
    }

    #[test]
    fn test_compatibility_floor() {
        let existing = (0..5).map(|i| job(&format!("j{}", i), 6_000.0)).collect();
        let candidate = job("a", 6_000.0).with_existing(existing);

        let analysis = ConflictSynergyAnalyzer::new().analyze(&candidate, &context());
        assert_eq!(analysis.compatibility_score, 0.0);
    }

    #[test]
    fn test_no_existing_scenarios() {
        let analysis = ConflictSynergyAnalyzer::new().analyze(&job("solo", 6_000.0), &context());
        assert!(analysis.conflicts.is_empty());
        assert_eq!(analysis.recommendations.len(), 1);
    }
}

//! Recommendation synthesis
//!
//! Builds primary / secondary / creative-hybrid records from either ranked
//! options or a single-scenario assessment, then optionally asks the insight
//! collaborator for a narrative. Any collaborator failure, timeout or absence
//! falls back to a deterministic template.

use crate::insights::InsightProvider;
use crate::models::{
    ConflictAnalysis, FeasibilityAssessment, FeasibilityRiskBand, FinancialContext,
    FinancialEffects, InsightSource, RankedOption, Recommendation, RecommendationKind,
    RecommendationSet, Scenario, ScenarioType, ViabilityFactors,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(8);

fn action_steps(scenario_type: ScenarioType) -> Vec<String> {
    let steps: &[&str] = match scenario_type {
        ScenarioType::JobChange => &[
            "Confirm the full compensation package in writing",
            "Keep two months of expenses liquid through the transition",
            "Redirect the raise to savings before lifestyle costs grow",
        ],
        ScenarioType::CareerBreak => &[
            "Build a dedicated runway fund before the break starts",
            "Pause discretionary subscriptions for the duration",
        ],
        ScenarioType::HomePurchase => &[
            "Get mortgage pre-approval to lock the payment estimate",
            "Keep closing costs separate from the down payment",
            "Hold an emergency reserve after closing",
        ],
        ScenarioType::MajorPurchase => &[
            "Compare financing against paying cash",
            "Schedule the purchase after any income change settles",
        ],
        ScenarioType::DebtPayoff => &[
            "Set up an automatic payment on the payoff date",
            "Target the highest-interest balance first",
        ],
        ScenarioType::Investment => &[
            "Automate the monthly contribution",
            "Review allocation against your risk tolerance yearly",
        ],
        ScenarioType::EmergencyFund => &[
            "Open a separate high-yield savings account",
            "Automate the contribution right after payday",
        ],
        ScenarioType::ExpenseChange => &[
            "Update the monthly budget with the new amount",
            "Review the change again after three months",
        ],
    };

    steps.iter().map(|s| s.to_string()).collect()
}

fn weakest_factor(factors: &ViabilityFactors) -> (&'static str, f64) {
    [
        ("financial capacity", factors.financial_capacity),
        ("resource availability", factors.resource_availability),
        ("timeline realism", factors.timeline_realism),
        ("risk profile", factors.risk_factor_score),
        ("compatibility", factors.conflict_impact),
    ]
    .into_iter()
    .fold(("financial capacity", f64::INFINITY), |worst, current| {
        if current.1 < worst.1 {
            current
        } else {
            worst
        }
    })
}

/// Average the numeric parameters two scenarios share
fn blend(a: &Scenario, b: &Scenario) -> Scenario {
    let mut hybrid = a.clone();
    hybrid.id = format!("{}+{}-hybrid", a.id, b.id);
    hybrid.name = format!("{} / {} hybrid", a.name, b.name);

    if a.scenario_type == b.scenario_type {
        for (key, _) in a.parameters.iter() {
            if let (Some(x), Some(y)) = (a.parameters.number(key), b.parameters.number(key)) {
                hybrid.parameters.set(key, (x + y) / 2.0);
            }
        }
    }

    hybrid
}

pub struct RecommendationSynthesizer {
    provider: Option<Arc<dyn InsightProvider>>,
    llm_timeout: Duration,
}

impl RecommendationSynthesizer {
    pub fn new() -> Self {
        Self {
            provider: None,
            llm_timeout: DEFAULT_LLM_TIMEOUT,
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn InsightProvider>, llm_timeout: Duration) -> Self {
        self.provider = Some(provider);
        self.llm_timeout = llm_timeout;
        self
    }

    /// Records for the best ranked options; `base` anchors the fallback
    pub fn from_ranked(&self, base: &Scenario, ranked: &[RankedOption]) -> Vec<Recommendation> {
        let Some(first) = ranked.first() else {
            return vec![Recommendation {
                kind: RecommendationKind::Primary,
                title: format!("Revisit the inputs for {}", base.name),
                scenario_id: base.id.clone(),
                rationale: "No alternative could be evaluated from the submitted parameters".to_string(),
                action_steps: action_steps(base.scenario_type),
                expected_monthly_impact: 0.0,
                confidence: 0.0,
            }];
        };

        let mut out = vec![Recommendation {
            kind: RecommendationKind::Primary,
            title: format!("Go with {}", first.scenario.name),
            scenario_id: first.scenario.id.clone(),
            rationale: format!(
                "Highest composite score ({:.1}) with ROI {:.0}, liquidity {:.0} and sustainability {:.0}",
                first.composite_score,
                first.criteria.roi,
                first.criteria.liquidity,
                first.criteria.sustainability
            ),
            action_steps: action_steps(first.scenario.scenario_type),
            expected_monthly_impact: first.monthly_impact,
            confidence: (first.composite_score / 100.0).clamp(0.0, 1.0),
        }];

        if let Some(second) = ranked.get(1) {
            out.push(Recommendation {
                kind: RecommendationKind::Secondary,
                title: format!("Fallback: {}", second.scenario.name),
                scenario_id: second.scenario.id.clone(),
                rationale: format!(
                    "Ranked #{} ({:.1}); risk score {:.0} vs {:.0} for the top option",
                    second.rank, second.composite_score, second.criteria.risk, first.criteria.risk
                ),
                action_steps: action_steps(second.scenario.scenario_type),
                expected_monthly_impact: second.monthly_impact,
                confidence: (second.composite_score / 100.0).clamp(0.0, 1.0),
            });

            let hybrid = blend(&first.scenario, &second.scenario);
            let rationale = if first.scenario.scenario_type == second.scenario.scenario_type {
                "Splits the difference between the two best parameter sets".to_string()
            } else {
                format!(
                    "Phase in {} first, then {} once cash flow settles",
                    first.scenario.name, second.scenario.name
                )
            };

            out.push(Recommendation {
                kind: RecommendationKind::CreativeHybrid,
                title: format!("Blend {} with {}", first.scenario.name, second.scenario.name),
                scenario_id: hybrid.id,
                rationale,
                action_steps: action_steps(first.scenario.scenario_type),
                expected_monthly_impact: (first.monthly_impact + second.monthly_impact) / 2.0,
                confidence: (first.composite_score.min(second.composite_score) / 100.0 * 0.9)
                    .clamp(0.0, 1.0),
            });
        }

        out
    }

    /// Records for a single scenario from its feasibility assessment
    pub fn from_assessment(
        &self,
        scenario: &Scenario,
        effects: Option<&FinancialEffects>,
        conflicts: Option<&ConflictAnalysis>,
        feasibility: Option<&FeasibilityAssessment>,
    ) -> Vec<Recommendation> {
        let impact = effects.map_or(0.0, |e| e.monthly_impact);
        let confidence = feasibility.map_or(0.5, |f| (f.feasibility_score / 100.0).clamp(0.0, 1.0));

        let (title, rationale) = match feasibility.map(|f| (f.feasibility_risk_band, f.feasibility_score)) {
            Some((FeasibilityRiskBand::Low, score)) => (
                format!("Proceed with {}", scenario.name),
                format!("Feasibility {:.0}/100 leaves comfortable headroom", score),
            ),
            Some((FeasibilityRiskBand::Medium, score)) => (
                format!("Proceed with {} after adjustments", scenario.name),
                format!("Feasibility {:.0}/100 is workable but has weak spots", score),
            ),
            Some((FeasibilityRiskBand::High, score)) => (
                format!("Scale back {}", scenario.name),
                format!("Feasibility {:.0}/100 signals strain on current finances", score),
            ),
            Some((FeasibilityRiskBand::VeryHigh, score)) => (
                format!("Defer {}", scenario.name),
                format!("Feasibility {:.0}/100 is too low to start now", score),
            ),
            None => (
                format!("Review {}", scenario.name),
                "Feasibility could not be assessed; review the inputs".to_string(),
            ),
        };

        let mut out = vec![Recommendation {
            kind: RecommendationKind::Primary,
            title,
            scenario_id: scenario.id.clone(),
            rationale,
            action_steps: action_steps(scenario.scenario_type),
            expected_monthly_impact: impact,
            confidence,
        }];

        let (factor, value) = feasibility
            .map(|f| weakest_factor(&f.viability_factors))
            .unwrap_or(("financial capacity", 0.0));
        out.push(Recommendation {
            kind: RecommendationKind::Secondary,
            title: format!("Strengthen {}", factor),
            scenario_id: scenario.id.clone(),
            rationale: format!("{} is the weakest viability factor at {:.0}/100", factor, value),
            action_steps: vec![
                format!("Focus the next three months on improving {}", factor),
                "Re-run the analysis once balances update".to_string(),
            ],
            expected_monthly_impact: impact,
            confidence: (confidence * 0.8).clamp(0.0, 1.0),
        });

        if let Some(analysis) = conflicts {
            if let Some(synergy) = analysis.synergies.first() {
                out.push(Recommendation {
                    kind: RecommendationKind::CreativeHybrid,
                    title: format!("Pair {} with its complementary scenario", scenario.name),
                    scenario_id: synergy.scenario_ids.join("+"),
                    rationale: synergy.description.clone(),
                    action_steps: action_steps(scenario.scenario_type),
                    expected_monthly_impact: impact,
                    confidence: (confidence * 0.9).clamp(0.0, 1.0),
                });
            } else if let Some(conflict) = analysis.conflicts.first() {
                out.push(Recommendation {
                    kind: RecommendationKind::CreativeHybrid,
                    title: format!("Stage {} around existing plans", scenario.name),
                    scenario_id: scenario.id.clone(),
                    rationale: conflict.description.clone(),
                    action_steps: analysis.recommendations.iter().take(2).cloned().collect(),
                    expected_monthly_impact: impact,
                    confidence: (confidence * 0.7).clamp(0.0, 1.0),
                });
            }
        }

        out
    }

    /// Attach a narrative, from the collaborator when it answers in time
    pub async fn synthesize(
        &self,
        scenario: &Scenario,
        recommendations: Vec<Recommendation>,
        context: &FinancialContext,
    ) -> RecommendationSet {
        if let Some(provider) = &self.provider {
            let call = provider.request_insights(scenario, &recommendations, context);

            match tokio::time::timeout(self.llm_timeout, call).await {
                Ok(Ok(insights)) if !insights.insights.trim().is_empty() => {
                    debug!(provider = provider.name(), "Insight collaborator answered");
                    return RecommendationSet {
                        narrative: insights.insights.clone(),
                        recommendations,
                        source: InsightSource::Llm,
                        insights: Some(insights),
                    };
                }
                Ok(Ok(_)) => {
                    warn!(provider = provider.name(), "Insight collaborator returned empty text");
                }
                Ok(Err(e)) => {
                    warn!(provider = provider.name(), error = %e, "Insight collaborator failed");
                }
                Err(_) => {
                    warn!(
                        provider = provider.name(),
                        timeout_ms = self.llm_timeout.as_millis() as u64,
                        "Insight collaborator timed out"
                    );
                }
            }
        }

        RecommendationSet {
            narrative: fallback_narrative(scenario, &recommendations, context),
            recommendations,
            source: InsightSource::RuleBased,
            insights: None,
        }
    }
}

impl Default for RecommendationSynthesizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic narrative; never empty
pub fn fallback_narrative(
    scenario: &Scenario,
    recommendations: &[Recommendation],
    context: &FinancialContext,
) -> String {
    let mut out = format!("{} ({}): ", scenario.name, scenario.scenario_type);

    match recommendations.first() {
        Some(primary) => {
            out.push_str(&format!(
                "{}. {}. Expected monthly impact {:+.2} against {:.2} currently available.",
                primary.title,
                primary.rationale,
                primary.expected_monthly_impact,
                context.available_income()
            ));
        }
        None => out.push_str("no recommendation could be produced; review the scenario inputs."),
    }

    if let Some(secondary) = recommendations
        .iter()
        .find(|r| r.kind == RecommendationKind::Secondary)
    {
        out.push_str(&format!(" Alternative: {}.", secondary.title));
    }

    out
}

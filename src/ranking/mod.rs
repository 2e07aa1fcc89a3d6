//! Multi-criteria ranking of scenario alternatives
//!
//! Each option is scored on ROI, risk, liquidity and sustainability, blended
//! into a base composite, then reweighted by preference multipliers derived
//! from the user's constraint flags. The final sort is stable so ties keep
//! their input order.

pub mod variations;

pub use variations::{Variation, VariationGenerator};

use crate::conflicts::ConflictSynergyAnalyzer;
use crate::effects::FinancialEffectCalculator;
use crate::feasibility::base_risk_score;
use crate::models::{
    CriteriaScores, FinancialContext, MonteCarloResult, RankedOption, Scenario, ScenarioType, Tier,
};
use crate::simulation::MonteCarloSimulator;
use tracing::debug;

/// Relative weight of each ranking criterion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriteriaWeights {
    pub roi: f64,
    pub risk: f64,
    pub liquidity: f64,
    pub sustainability: f64,
}

impl Default for CriteriaWeights {
    fn default() -> Self {
        Self {
            roi: 0.30,
            risk: 0.25,
            liquidity: 0.25,
            sustainability: 0.20,
        }
    }
}

impl CriteriaWeights {
    /// Weighted blend; risk contributes through `100 - risk`
    pub fn blend(&self, criteria: &CriteriaScores) -> f64 {
        let total = self.roi + self.risk + self.liquidity + self.sustainability;
        if total <= 0.0 {
            return 0.0;
        }

        (criteria.roi * self.roi
            + (100.0 - criteria.risk) * self.risk
            + criteria.liquidity * self.liquidity
            + criteria.sustainability * self.sustainability)
            / total
    }

    fn scaled(&self, multipliers: &CriteriaWeights) -> Self {
        Self {
            roi: self.roi * multipliers.roi,
            risk: self.risk * multipliers.risk,
            liquidity: self.liquidity * multipliers.liquidity,
            sustainability: self.sustainability * multipliers.sustainability,
        }
    }
}

/// Multipliers implied by free-text constraint flags such as
/// "risk-averse" or "needs liquidity"
pub fn preference_multipliers(constraints: &[String]) -> CriteriaWeights {
    let mut m = CriteriaWeights {
        roi: 1.0,
        risk: 1.0,
        liquidity: 1.0,
        sustainability: 1.0,
    };

    for constraint in constraints {
        let flag = constraint.to_lowercase();

        if flag.contains("risk-averse") || flag.contains("risk averse") || flag.contains("conservative") {
            m.risk *= 1.5;
            m.roi *= 0.8;
        }
        if flag.contains("liquidity") {
            m.liquidity *= 1.5;
        }
        if flag.contains("growth") || flag.contains("aggressive") {
            m.roi *= 1.4;
            m.risk *= 0.8;
        }
        if flag.contains("stab") || flag.contains("sustainab") {
            m.sustainability *= 1.3;
        }
    }

    m
}

/// Annual return as a fraction; values above 1 are read as percentages
fn rate(value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(v) if v > 1.0 => v / 100.0,
        Some(v) => v,
        None => default,
    }
}

/// Share of yearly outflow that is retained as assets or saved interest
fn retention(scenario: &Scenario) -> f64 {
    let params = &scenario.parameters;
    match scenario.scenario_type {
        ScenarioType::Investment => 1.0 + rate(params.number("expectedReturn"), 0.07),
        ScenarioType::DebtPayoff => 1.0 + rate(params.number("interestRate"), 0.0),
        ScenarioType::EmergencyFund => 1.0,
        ScenarioType::HomePurchase => 0.35,
        ScenarioType::JobChange
        | ScenarioType::CareerBreak
        | ScenarioType::MajorPurchase
        | ScenarioType::ExpenseChange => 0.0,
    }
}

/// ROI mapped onto 0–100 with 50 meaning break-even
pub fn roi_score(scenario: &Scenario, context: &FinancialContext, monthly_impact: f64) -> f64 {
    let yearly_outflow = (-monthly_impact).max(0.0) * 12.0;
    let yearly_benefit = monthly_impact * 12.0 + yearly_outflow * retention(scenario);

    let basis = if yearly_outflow > 0.0 {
        yearly_outflow
    } else {
        (context.monthly_income * 12.0).max(1.0)
    };

    let roi_percent = yearly_benefit / basis * 100.0;
    (50.0 + roi_percent / 2.0).clamp(0.0, 100.0)
}

/// Higher means riskier: inherent type risk plus simulated dispersion
pub fn risk_score(scenario_type: ScenarioType, simulation: &MonteCarloResult) -> f64 {
    let p = &simulation.percentiles;
    let spread_percent = (p.p95 - p.p05) / p.p50.abs().max(1.0) * 100.0;
    let negative_penalty = if p.p05 < 0.0 { 30.0 } else { 0.0 };

    ((100.0 - base_risk_score(scenario_type)) * 0.6 + spread_percent * 2.0 + negative_penalty)
        .clamp(0.0, 100.0)
}

/// Extra risk carried by conflicts with scenarios already in flight
pub fn conflict_risk_penalty(compatibility_score: f64) -> f64 {
    (100.0 - compatibility_score).max(0.0) * 0.5
}

pub fn liquidity_score(final_balance: f64) -> f64 {
    if final_balance > 50_000.0 {
        100.0
    } else if final_balance > 20_000.0 {
        80.0
    } else if final_balance > 10_000.0 {
        60.0
    } else if final_balance > 5_000.0 {
        40.0
    } else {
        20.0
    }
}

pub fn sustainability_score(net_monthly_cash_flow: f64) -> f64 {
    if net_monthly_cash_flow > 0.0 {
        100.0
    } else if net_monthly_cash_flow > -500.0 {
        70.0
    } else if net_monthly_cash_flow > -1_000.0 {
        40.0
    } else {
        20.0
    }
}

/// An option with its criteria computed, awaiting ranking
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedOption {
    pub scenario: Scenario,
    pub label: String,
    pub monthly_impact: f64,
    pub criteria: CriteriaScores,
}

fn tier_for(index: usize, count: usize) -> Tier {
    let top = count.div_ceil(3);
    let middle = (2 * count).div_ceil(3);

    if index < top {
        Tier::Top
    } else if index < middle {
        Tier::Middle
    } else {
        Tier::Bottom
    }
}

pub struct MultiCriteriaRanker {
    calculator: FinancialEffectCalculator,
    analyzer: ConflictSynergyAnalyzer,
    simulator: MonteCarloSimulator,
    weights: CriteriaWeights,
}

impl MultiCriteriaRanker {
    pub fn new(simulator: MonteCarloSimulator) -> Self {
        Self {
            calculator: FinancialEffectCalculator::new(),
            analyzer: ConflictSynergyAnalyzer::new(),
            simulator,
            weights: CriteriaWeights::default(),
        }
    }

    pub fn weights(&self) -> &CriteriaWeights {
        &self.weights
    }

    /// Run effects, conflict analysis and a simulation for one option.
    /// Liquidity and sustainability see the option together with the
    /// scenarios already in flight; ROI is the option's own.
    pub fn evaluate(&self, scenario: &Scenario, label: &str, context: &FinancialContext) -> EvaluatedOption {
        let effects = self.calculator.calculate(scenario, context);
        let combined = self.calculator.combined_monthly_impact(scenario, context);
        let conflicts = self.analyzer.analyze(scenario, context);
        let simulation = self.simulator.simulate(combined, context);

        let risk = risk_score(scenario.scenario_type, &simulation)
            + conflict_risk_penalty(conflicts.compatibility_score);

        let criteria = CriteriaScores {
            roi: roi_score(scenario, context, effects.monthly_impact),
            risk: risk.clamp(0.0, 100.0),
            liquidity: liquidity_score(simulation.statistics.mean),
            sustainability: sustainability_score(context.available_income() + combined),
        };

        EvaluatedOption {
            scenario: scenario.clone(),
            label: label.to_string(),
            monthly_impact: effects.monthly_impact,
            criteria,
        }
    }

    /// Score, reweight by preferences, sort descending and assign tiers
    pub fn rank(&self, options: Vec<EvaluatedOption>, constraints: &[String]) -> Vec<RankedOption> {
        let preferred = self.weights.scaled(&preference_multipliers(constraints));

        let mut scored: Vec<(EvaluatedOption, f64, f64)> = options
            .into_iter()
            .map(|option| {
                let base = self.weights.blend(&option.criteria);
                let composite = preferred.blend(&option.criteria);
                (option, base, composite)
            })
            .collect();

        // Vec::sort_by is stable; equal composites keep input order
        scored.sort_by(|a, b| b.2.total_cmp(&a.2));

        let count = scored.len();
        let ranked: Vec<RankedOption> = scored
            .into_iter()
            .enumerate()
            .map(|(index, (option, base_score, composite_score))| RankedOption {
                scenario: option.scenario,
                variant_label: option.label,
                monthly_impact: option.monthly_impact,
                criteria: option.criteria,
                base_score,
                composite_score,
                rank: index + 1,
                tier: tier_for(index, count),
            })
            .collect();

        debug!(
            options = count,
            constraints = constraints.len(),
            top = ranked.first().map(|r| r.scenario.id.as_str()).unwrap_or("-"),
            "Options ranked"
        );

        ranked
    }

    pub fn rank_scenarios(
        &self,
        candidates: &[(Scenario, String)],
        context: &FinancialContext,
        constraints: &[String],
    ) -> Vec<RankedOption> {
        let evaluated = candidates
            .iter()
            .map(|(scenario, label)| self.evaluate(scenario, label, context))
            .collect();
        self.rank(evaluated, constraints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> FinancialContext {
        FinancialContext::new(15_000.0, 7_000.0, 4_500.0)
    }

    fn option(id: &str, roi: f64, risk: f64, liquidity: f64, sustainability: f64) -> EvaluatedOption {
        EvaluatedOption {
            scenario: Scenario::new(id, id, ScenarioType::Investment).with_param("monthlyContribution", 100),
            label: id.to_string(),
            monthly_impact: -100.0,
            criteria: CriteriaScores {
                roi,
                risk,
                liquidity,
                sustainability,
            },
        }
    }

    fn ranker() -> MultiCriteriaRanker {
        MultiCriteriaRanker::new(MonteCarloSimulator::new().with_trials(50).with_seed(11))
    }

    #[test]
    fn test_base_composite_formula() {
        let ranked = ranker().rank(vec![option("a", 60.0, 40.0, 80.0, 100.0)], &[]);
        // 60×0.3 + 60×0.25 + 80×0.25 + 100×0.2
        assert!((ranked[0].base_score - 73.0).abs() < 1e-9);
        assert!((ranked[0].composite_score - ranked[0].base_score).abs() < 1e-9);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[0].tier, Tier::Top);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let options = vec![
            option("first", 50.0, 50.0, 50.0, 50.0),
            option("second", 50.0, 50.0, 50.0, 50.0),
            option("third", 50.0, 50.0, 50.0, 50.0),
        ];
        let ranked = ranker().rank(options, &[]);
        let ids: Vec<&str> = ranked.iter().map(|r| r.scenario.id.as_str()).collect();

        assert_eq!(ids, vec!["first", "second", "third"]);
        let tiers: Vec<Tier> = ranked.iter().map(|r| r.tier).collect();
        assert_eq!(tiers, vec![Tier::Top, Tier::Middle, Tier::Bottom]);
    }

    #[test]
    fn test_preferences_reorder_options() {
        let growth = option("growth", 90.0, 70.0, 40.0, 70.0);
        let safe = option("safe", 55.0, 10.0, 60.0, 70.0);

        let neutral = ranker().rank(vec![growth.clone(), safe.clone()], &[]);
        let cautious = ranker().rank(
            vec![growth, safe],
            &["risk-averse".to_string(), "needs liquidity".to_string()],
        );

        assert_eq!(neutral[0].scenario.id, "safe");
        assert_eq!(cautious[0].scenario.id, "safe");
        assert!(cautious[0].composite_score - cautious[1].composite_score
            > neutral[0].composite_score - neutral[1].composite_score);

        let bold = ranker().rank(
            vec![option("growth", 95.0, 40.0, 60.0, 70.0), option("safe", 55.0, 30.0, 60.0, 70.0)],
            &["growth".to_string()],
        );
        assert_eq!(bold[0].scenario.id, "growth");
    }

    #[test]
    fn test_bucket_thresholds() {
        assert_eq!(liquidity_score(50_001.0), 100.0);
        assert_eq!(liquidity_score(50_000.0), 80.0);
        assert_eq!(liquidity_score(10_000.5), 60.0);
        assert_eq!(liquidity_score(5_000.0), 20.0);
        assert_eq!(sustainability_score(1.0), 100.0);
        assert_eq!(sustainability_score(0.0), 70.0);
        assert_eq!(sustainability_score(-999.0), 40.0);
        assert_eq!(sustainability_score(-1_000.0), 20.0);
    }

    #[test]
    fn test_rank_generated_variations() {
        let base = Scenario::new("inv", "Index fund", ScenarioType::Investment)
            .with_param("monthlyContribution", 800)
            .with_param("expectedReturn", 7);

        let candidates: Vec<(Scenario, String)> = VariationGenerator::new()
            .generate(&base)
            .into_iter()
            .map(|v| (v.scenario, v.label))
            .collect();

        let ranked = ranker().rank_scenarios(&candidates, &context(), &[]);
        assert_eq!(ranked.len(), 3);
        for (index, option) in ranked.iter().enumerate() {
            assert_eq!(option.rank, index + 1);
            assert!((0.0..=100.0).contains(&option.composite_score));
        }
        for pair in ranked.windows(2) {
            assert!(pair[0].composite_score >= pair[1].composite_score);
        }
    }

    #[test]
    fn test_sibling_commitments_weigh_on_evaluation() {
        let ranker = ranker();
        let invest = Scenario::new("inv", "Index fund", ScenarioType::Investment)
            .with_param("monthlyContribution", 400)
            .with_param("expectedReturn", 0.07);
        let loaded = invest.clone().with_existing(vec![Scenario::new("debt", "Card", ScenarioType::DebtPayoff)
            .with_param("monthlyPayment", 3_000)
            .with_param("debtAmount", 20_000)]);

        let alone = ranker.evaluate(&invest, "alone", &context());
        let burdened = ranker.evaluate(&loaded, "burdened", &context());

        assert_eq!(alone.criteria.sustainability, 100.0);
        assert_eq!(burdened.criteria.sustainability, 40.0);
        assert!(burdened.criteria.liquidity < alone.criteria.liquidity);
        assert!(burdened.criteria.risk > alone.criteria.risk);
        // ROI and the reported impact stay the option's own
        assert_eq!(burdened.criteria.roi, alone.criteria.roi);
        assert_eq!(burdened.monthly_impact, -400.0);
    }

    #[test]
    fn test_conflict_risk_penalty() {
        assert_eq!(conflict_risk_penalty(100.0), 0.0);
        assert_eq!(conflict_risk_penalty(70.0), 15.0);
        assert_eq!(conflict_risk_penalty(0.0), 50.0);
    }

    #[test]
    fn test_roi_score_break_even_and_income() {
        let ctx = context();
        let fund = Scenario::new("e", "Fund", ScenarioType::EmergencyFund).with_param("monthlyContribution", 300);
        assert_eq!(roi_score(&fund, &ctx, -300.0), 50.0);

        let purchase = Scenario::new("m", "Car", ScenarioType::MajorPurchase).with_param("purchasePrice", 30_000);
        assert_eq!(roi_score(&purchase, &ctx, -400.0), 0.0);
    }
}

//! Weighted feasibility scoring
//!
//! Five viability factors, each normalized to 0–100, are blended into a
//! composite score. The composite is then bucketed into a
//! `FeasibilityRiskBand`, which is unrelated to the `risk_factor_score`
//! sub-factor that feeds it.

use crate::models::{
    ConflictAnalysis, FeasibilityAssessment, FeasibilityRiskBand, FinancialContext,
    FinancialEffects, MonteCarloResult, RiskTolerance, Scenario, ScenarioType,
    SustainabilityRating, ViabilityFactors,
};
use tracing::debug;

pub const FINANCIAL_CAPACITY_WEIGHT: f64 = 0.30;
pub const RESOURCE_AVAILABILITY_WEIGHT: f64 = 0.25;
pub const TIMELINE_REALISM_WEIGHT: f64 = 0.15;
pub const RISK_FACTOR_WEIGHT: f64 = 0.15;
pub const CONFLICT_IMPACT_WEIGHT: f64 = 0.15;

fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// `ratio × 100` capped at 100; a non-positive requirement is fully covered
fn coverage(available: f64, required: f64) -> f64 {
    if required <= 0.0 {
        100.0
    } else {
        clamp_score(available / required * 100.0)
    }
}

/// `min(100, availableIncome / requiredAmount × 100)`
pub fn financial_capacity(context: &FinancialContext, monthly_impact: f64) -> f64 {
    let required = (-monthly_impact).max(0.0);
    let available = context.available_income();

    if required <= 0.0 {
        100.0
    } else if available <= 0.0 {
        0.0
    } else {
        coverage(available, required)
    }
}

/// Cash needed up front before a purchase can happen
fn upfront_cost(scenario: &Scenario) -> f64 {
    let params = &scenario.parameters;
    match scenario.scenario_type {
        ScenarioType::HomePurchase => params.number_or("downPayment", 0.0),
        ScenarioType::MajorPurchase => {
            let price = params.number_or("purchasePrice", 0.0);
            match params.number("downPayment") {
                Some(down) => down,
                None if params.number("monthlyPayment").is_some() => price * 0.2,
                None => price,
            }
        }
        _ => 0.0,
    }
}

/// Savings coverage of what the scenario needs from existing resources
pub fn resource_availability(scenario: &Scenario, context: &FinancialContext, monthly_impact: f64) -> f64 {
    let params = &scenario.parameters;
    let balance = context.current_balance;
    let expenses = context.monthly_expenses;

    match scenario.scenario_type {
        ScenarioType::HomePurchase => match params.number("downPayment") {
            Some(_) => coverage(balance, upfront_cost(scenario)),
            None => 50.0,
        },
        ScenarioType::MajorPurchase => coverage(balance, upfront_cost(scenario)),
        ScenarioType::DebtPayoff => {
            coverage(balance, 3.0 * params.number_or("monthlyPayment", 0.0))
        }
        ScenarioType::CareerBreak => {
            coverage(balance, params.number_or("durationMonths", 0.0) * expenses)
        }
        ScenarioType::JobChange => coverage(balance, 2.0 * expenses),
        ScenarioType::Investment => coverage(balance, 3.0 * expenses),
        ScenarioType::EmergencyFund => {
            if context.available_income() > 0.0 {
                100.0
            } else {
                40.0
            }
        }
        ScenarioType::ExpenseChange => coverage(balance, 6.0 * (-monthly_impact).max(0.0)),
    }
}

/// Months of saving or paying down the scenario needs before it is done
fn months_needed(scenario: &Scenario, context: &FinancialContext) -> Option<f64> {
    let params = &scenario.parameters;
    let balance = context.current_balance;
    let available = context.available_income();

    let from_savings = |shortfall: f64| -> Option<f64> {
        if shortfall <= 0.0 {
            Some(0.0)
        } else if available <= 0.0 {
            None
        } else {
            Some(shortfall / available)
        }
    };

    match scenario.scenario_type {
        ScenarioType::HomePurchase | ScenarioType::MajorPurchase => {
            from_savings(upfront_cost(scenario) - balance)
        }
        ScenarioType::DebtPayoff => {
            let debt = params.number_or("debtAmount", 0.0);
            match params.number("monthlyPayment") {
                Some(payment) if payment > 0.0 => Some(debt.max(0.0) / payment),
                _ if debt <= 0.0 => Some(0.0),
                _ => None,
            }
        }
        ScenarioType::EmergencyFund => {
            let target = params
                .number("targetAmount")
                .unwrap_or(6.0 * context.monthly_expenses);
            let shortfall = target - balance;
            match params.number("monthlyContribution") {
                _ if shortfall <= 0.0 => Some(0.0),
                Some(contribution) if contribution > 0.0 => Some(shortfall / contribution),
                _ => None,
            }
        }
        ScenarioType::CareerBreak => {
            let cost = params.number_or("durationMonths", 0.0) * context.monthly_expenses;
            from_savings(cost - balance)
        }
        ScenarioType::JobChange | ScenarioType::Investment | ScenarioType::ExpenseChange => Some(0.0),
    }
}

/// Months needed against `timelineMonths` (or the context's horizon)
pub fn timeline_realism(scenario: &Scenario, context: &FinancialContext) -> f64 {
    let target = scenario
        .parameters
        .number("timelineMonths")
        .filter(|m| *m > 0.0)
        .unwrap_or_else(|| context.time_horizon.months());

    match months_needed(scenario, context) {
        None => 0.0,
        Some(needed) if needed <= target => 100.0,
        Some(needed) => clamp_score(100.0 * target / needed),
    }
}

pub(crate) fn base_risk_score(scenario_type: ScenarioType) -> f64 {
    match scenario_type {
        ScenarioType::JobChange => 70.0,
        ScenarioType::CareerBreak => 35.0,
        ScenarioType::HomePurchase => 60.0,
        ScenarioType::MajorPurchase => 65.0,
        ScenarioType::DebtPayoff => 90.0,
        ScenarioType::Investment => 55.0,
        ScenarioType::EmergencyFund => 95.0,
        ScenarioType::ExpenseChange => 80.0,
    }
}

/// Higher means safer. Base risk per type, shifted by the user's tolerance
/// for inherently risky types and by a weak simulated downside.
pub fn risk_factor_score(
    scenario: &Scenario,
    context: &FinancialContext,
    simulation: Option<&MonteCarloResult>,
) -> f64 {
    let base = base_risk_score(scenario.scenario_type);

    let tolerance_shift = if base < 70.0 {
        match context.risk_tolerance {
            RiskTolerance::Low => -10.0,
            RiskTolerance::Medium => 0.0,
            RiskTolerance::High => 10.0,
        }
    } else {
        0.0
    };

    let downside_shift = match simulation {
        Some(sim) if sim.percentiles.p05 < 0.0 => -25.0,
        Some(sim) if sim.percentiles.p05 < context.monthly_expenses => -10.0,
        _ => 0.0,
    };

    clamp_score(base + tolerance_shift + downside_shift)
}

/// Stepped 100 / 70 / 40 by conflict count
pub fn conflict_impact(conflict_count: usize) -> f64 {
    match conflict_count {
        0 => 100.0,
        1 => 70.0,
        _ => 40.0,
    }
}

pub fn risk_band(feasibility_score: f64) -> FeasibilityRiskBand {
    if feasibility_score >= 80.0 {
        FeasibilityRiskBand::Low
    } else if feasibility_score >= 60.0 {
        FeasibilityRiskBand::Medium
    } else if feasibility_score >= 40.0 {
        FeasibilityRiskBand::High
    } else {
        FeasibilityRiskBand::VeryHigh
    }
}

pub fn sustainability_rating(net_monthly_cash_flow: f64) -> SustainabilityRating {
    if net_monthly_cash_flow > 0.0 {
        SustainabilityRating::Strong
    } else if net_monthly_cash_flow > -500.0 {
        SustainabilityRating::Moderate
    } else {
        SustainabilityRating::Weak
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FeasibilityScorer;

impl FeasibilityScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn assess(
        &self,
        scenario: &Scenario,
        context: &FinancialContext,
        effects: &FinancialEffects,
        conflicts: Option<&ConflictAnalysis>,
        simulation: Option<&MonteCarloResult>,
    ) -> FeasibilityAssessment {
        let impact = effects.monthly_impact;

        let factors = ViabilityFactors {
            financial_capacity: financial_capacity(context, impact),
            resource_availability: resource_availability(scenario, context, impact),
            timeline_realism: timeline_realism(scenario, context),
            risk_factor_score: risk_factor_score(scenario, context, simulation),
            conflict_impact: conflict_impact(conflicts.map_or(0, |c| c.conflicts.len())),
        };

        let feasibility_score = clamp_score(
            factors.financial_capacity * FINANCIAL_CAPACITY_WEIGHT
                + factors.resource_availability * RESOURCE_AVAILABILITY_WEIGHT
                + factors.timeline_realism * TIMELINE_REALISM_WEIGHT
                + factors.risk_factor_score * RISK_FACTOR_WEIGHT
                + factors.conflict_impact * CONFLICT_IMPACT_WEIGHT,
        );

        debug!(
            scenario_id = %scenario.id,
            feasibility_score,
            "Feasibility assessed"
        );

        FeasibilityAssessment {
            feasibility_score,
            feasibility_risk_band: risk_band(feasibility_score),
            sustainability_rating: sustainability_rating(context.available_income() + impact),
            viability_factors: factors,
        }
    }
}

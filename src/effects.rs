//! Deterministic financial effect modeling
//!
//! Monthly impact comes from a closed formula table keyed on the scenario
//! type; the balance projection is plain repeated addition over 12 months.

use crate::models::{
    AccountKind, BalancePoint, CashFlowChanges, FinancialContext, FinancialEffects, Scenario,
    ScenarioType,
};

pub const PROJECTION_MONTHS: u32 = 12;

/// Signed change to monthly cash flow caused by a scenario
pub fn monthly_impact(scenario: &Scenario, context: &FinancialContext) -> f64 {
    let params = &scenario.parameters;

    match scenario.scenario_type {
        ScenarioType::JobChange => {
            params.number_or("newSalary", 0.0) - params.number_or("currentSalary", 0.0)
        }
        ScenarioType::CareerBreak => -params.number_or("currentSalary", context.monthly_income),
        ScenarioType::HomePurchase => {
            -(params.number_or("monthlyPayment", 0.0) - params.number_or("currentRent", 0.0))
        }
        ScenarioType::MajorPurchase | ScenarioType::DebtPayoff => {
            -params.number_or("monthlyPayment", 0.0)
        }
        ScenarioType::Investment | ScenarioType::EmergencyFund => params
            .number("monthlyContribution")
            .or_else(|| params.number("monthlyPayment"))
            .map(|amount| -amount)
            .unwrap_or(0.0),
        ScenarioType::ExpenseChange => -params.number_or("monthlyChange", 0.0),
    }
}

/// `balance[i] = balance[i-1] + income - expenses + impact`, months 1..=12
pub fn project_balance(context: &FinancialContext, monthly_impact: f64) -> Vec<BalancePoint> {
    let net = context.available_income() + monthly_impact;
    let mut balance = context.current_balance;

    (1..=PROJECTION_MONTHS)
        .map(|month| {
            balance += net;
            BalancePoint { month, balance }
        })
        .collect()
}

fn affected_kinds(scenario_type: ScenarioType) -> &'static [AccountKind] {
    match scenario_type {
        ScenarioType::JobChange | ScenarioType::CareerBreak | ScenarioType::ExpenseChange => {
            &[AccountKind::Checking]
        }
        ScenarioType::HomePurchase | ScenarioType::MajorPurchase => {
            &[AccountKind::Checking, AccountKind::Savings, AccountKind::Loan]
        }
        ScenarioType::DebtPayoff => &[AccountKind::Checking, AccountKind::Credit, AccountKind::Loan],
        ScenarioType::Investment => &[AccountKind::Checking, AccountKind::Investment],
        ScenarioType::EmergencyFund => &[AccountKind::Checking, AccountKind::Savings],
    }
}

fn cash_flow_changes(scenario_type: ScenarioType, impact: f64) -> CashFlowChanges {
    let mut changes = CashFlowChanges {
        net_change: impact,
        ..CashFlowChanges::default()
    };

    match scenario_type {
        ScenarioType::JobChange | ScenarioType::CareerBreak => changes.income_change = impact,
        ScenarioType::HomePurchase
        | ScenarioType::MajorPurchase
        | ScenarioType::DebtPayoff
        | ScenarioType::ExpenseChange => changes.expense_change = -impact,
        ScenarioType::Investment | ScenarioType::EmergencyFund => changes.savings_change = -impact,
    }

    changes
}

/// Calculator for per-scenario effects
#[derive(Debug, Default, Clone, Copy)]
pub struct FinancialEffectCalculator;

impl FinancialEffectCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn calculate(&self, scenario: &Scenario, context: &FinancialContext) -> FinancialEffects {
        let impact = monthly_impact(scenario, context);
        let kinds = affected_kinds(scenario.scenario_type);

        let affected_accounts = context
            .accounts
            .iter()
            .filter(|account| kinds.contains(&account.kind))
            .map(|account| account.id.clone())
            .collect();

        FinancialEffects {
            monthly_impact: impact,
            yearly_impact: impact * 12.0,
            balance_projection: project_balance(context, impact),
            affected_accounts,
            cash_flow_changes: cash_flow_changes(scenario.scenario_type, impact),
        }
    }

    /// Impact of a scenario together with every sibling already active
    pub fn combined_monthly_impact(&self, scenario: &Scenario, context: &FinancialContext) -> f64 {
        monthly_impact(scenario, context)
            + scenario
                .existing_scenarios
                .iter()
                .map(|existing| monthly_impact(existing, context))
                .sum::<f64>()
    }
}

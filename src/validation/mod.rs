//! Scenario validation
//!
//! Rules-based structural and semantic checks run before any modeling.
//! Problems are reported, never thrown: an invalid scenario still flows
//! through the pipeline with its errors recorded.

use crate::models::{FinancialContext, Scenario, ScenarioType, ValidationResult};
use tracing::debug;

/// Trait for validation rules
pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, scenario: &Scenario, context: Option<&FinancialContext>) -> RuleFindings;
}

/// Errors and warnings raised by a single rule
#[derive(Debug, Default)]
pub struct RuleFindings {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl RuleFindings {
    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Validator that runs every registered rule
pub struct ScenarioValidator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl ScenarioValidator {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add_rule(&mut self, rule: Box<dyn ValidationRule>) {
        self.rules.push(rule);
    }

    pub fn validate(&self, scenario: &Scenario, context: Option<&FinancialContext>) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for rule in &self.rules {
            let findings = rule.check(scenario, context);
            if !findings.errors.is_empty() {
                debug!(rule = rule.name(), errors = findings.errors.len(), "Validation rule failed");
            }
            errors.extend(findings.errors);
            warnings.extend(findings.warnings);
        }

        let validation_score = score(errors.len(), warnings.len());

        debug!(
            scenario_id = %scenario.id,
            errors = errors.len(),
            warnings = warnings.len(),
            validation_score,
            "Scenario validated"
        );

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            validation_score,
        }
    }
}

impl Default for ScenarioValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// `max(0, 100 - 20 per error - 5 per warning)`
pub fn score(error_count: usize, warning_count: usize) -> f64 {
    (100.0 - 20.0 * error_count as f64 - 5.0 * warning_count as f64).max(0.0)
}

//
// ========== Rules ==========
//

/// Rule: name and parameters must be present; a blank id only warns
pub struct RequiredFieldsRule;

impl ValidationRule for RequiredFieldsRule {
    fn name(&self) -> &'static str {
        "required_fields"
    }

    fn check(&self, scenario: &Scenario, _context: Option<&FinancialContext>) -> RuleFindings {
        let mut findings = RuleFindings::default();

        if scenario.id.trim().is_empty() {
            findings.warning("Scenario id is blank");
        }
        if scenario.name.trim().is_empty() {
            findings.error("Scenario name is required");
        }
        if scenario.parameters.is_empty() {
            findings.error("Scenario parameters are required");
        }

        findings
    }
}

/// Rule: per-type parameter constraints
pub struct TypeParametersRule;

impl ValidationRule for TypeParametersRule {
    fn name(&self) -> &'static str {
        "type_parameters"
    }

    fn check(&self, scenario: &Scenario, _context: Option<&FinancialContext>) -> RuleFindings {
        let mut findings = RuleFindings::default();
        let params = &scenario.parameters;

        match scenario.scenario_type {
            ScenarioType::JobChange => match params.number("newSalary") {
                Some(new_salary) if new_salary > 0.0 => {
                    if let Some(current) = params.number("currentSalary") {
                        if new_salary < current {
                            findings.warning("New salary is lower than current salary");
                        }
                    }
                }
                _ => findings.error("job_change requires newSalary > 0"),
            },
            ScenarioType::CareerBreak => {
                if !params.number("durationMonths").is_some_and(|m| m > 0.0) {
                    findings.error("career_break requires durationMonths > 0");
                }
            }
            ScenarioType::HomePurchase => {
                let price = params.number("homePrice");
                let down = params.number("downPayment");

                match (price, down) {
                    (Some(price), Some(down)) if price > 0.0 && down > 0.0 && down <= price => {
                        if down < price * 0.2 {
                            findings.warning("Down payment below 20% may require mortgage insurance");
                        }
                    }
                    (Some(price), _) if price <= 0.0 => {
                        findings.error("home_purchase requires homePrice > 0");
                    }
                    (None, _) => findings.error("home_purchase requires homePrice > 0"),
                    _ => findings.error("home_purchase requires 0 < downPayment <= homePrice"),
                }

                if params.number("monthlyPayment").is_none() {
                    findings.warning("No monthlyPayment given; housing cost change assumed zero");
                }
            }
            ScenarioType::MajorPurchase => {
                if !params.number("purchasePrice").is_some_and(|p| p > 0.0) {
                    findings.error("major_purchase requires purchasePrice > 0");
                }
            }
            ScenarioType::DebtPayoff => {
                if !params.number("monthlyPayment").is_some_and(|p| p > 0.0) {
                    findings.error("debt_payoff requires monthlyPayment > 0");
                }
                if !params.number("debtAmount").is_some_and(|d| d > 0.0) {
                    findings.warning("No positive debtAmount given; payoff timeline unknown");
                }
            }
            ScenarioType::Investment => {
                if !params.number("monthlyContribution").is_some_and(|c| c > 0.0) {
                    findings.error("investment requires monthlyContribution > 0");
                }
                if params.number("expectedReturn").is_none() {
                    findings.warning("No expectedReturn given; a 7% annual return is assumed");
                }
            }
            ScenarioType::EmergencyFund => {
                if !params.number("monthlyContribution").is_some_and(|c| c > 0.0) {
                    findings.error("emergency_fund requires monthlyContribution > 0");
                }
                if params.number("targetAmount").is_none() {
                    findings.warning("No targetAmount given; six months of expenses assumed");
                }
            }
            ScenarioType::ExpenseChange => {
                if !params.number("monthlyChange").is_some_and(|c| c != 0.0) {
                    findings.error("expense_change requires a non-zero monthlyChange");
                }
            }
        }

        findings
    }
}

/// Rule: new monthly outflow should fit within available income
pub struct AffordabilityRule;

impl ValidationRule for AffordabilityRule {
    fn name(&self) -> &'static str {
        "affordability"
    }

    fn check(&self, scenario: &Scenario, context: Option<&FinancialContext>) -> RuleFindings {
        let mut findings = RuleFindings::default();
        let Some(context) = context else {
            return findings;
        };

        let impact = crate::effects::monthly_impact(scenario, context);
        let available = context.available_income();

        if impact < 0.0 && -impact > available {
            findings.warning(format!(
                "Monthly outflow of {:.2} exceeds available income of {:.2}",
                -impact, available
            ));
        }

        findings
    }
}

/// Create a validator with the standard rules
pub fn create_default_validator() -> ScenarioValidator {
    let mut validator = ScenarioValidator::new();
    validator.add_rule(Box::new(RequiredFieldsRule));
    validator.add_rule(Box::new(TypeParametersRule));
    validator.add_rule(Box::new(AffordabilityRule));
    validator
}

//
// ================= Tests =================
//

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> FinancialContext {
        FinancialContext::new(5_000.0, 6_000.0, 4_500.0)
    }

    #[test]
    fn test_valid_debt_payoff() {
        let validator = create_default_validator();
        let scenario = Scenario::new("d1", "Pay off card", ScenarioType::DebtPayoff)
            .with_param("debtAmount", 20_000)
            .with_param("monthlyPayment", 600);

        let result = validator.validate(&scenario, Some(&context()));
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert_eq!(result.validation_score, 100.0);
    }

    #[test]
    fn test_home_purchase_down_payment_bounds() {
        let validator = create_default_validator();
        let scenario = Scenario::new("h1", "House", ScenarioType::HomePurchase)
            .with_param("homePrice", 300_000)
            .with_param("downPayment", 400_000)
            .with_param("monthlyPayment", 1_800);

        let result = validator.validate(&scenario, None);
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.validation_score, 80.0);
    }

    #[test]
    fn test_score_combines_errors_and_warnings() {
        let validator = create_default_validator();
        // Missing name (error), newSalary <= 0 (error)
        let scenario = Scenario::new("j1", "  ", ScenarioType::JobChange).with_param("newSalary", 0);

        let result = validator.validate(&scenario, None);
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.validation_score, 60.0);
    }

    #[test]
    fn test_blank_id_only_warns() {
        let validator = create_default_validator();
        let scenario = Scenario::new("", "Pay off card", ScenarioType::DebtPayoff)
            .with_param("debtAmount", 20_000)
            .with_param("monthlyPayment", 600);

        let result = validator.validate(&scenario, None);
        assert!(result.is_valid);
        assert_eq!(result.warnings, vec!["Scenario id is blank".to_string()]);
        assert_eq!(result.validation_score, 95.0);
    }

    #[test]
    fn test_empty_parameters_flagged() {
        let validator = create_default_validator();
        let scenario = Scenario::new("i1", "Invest", ScenarioType::Investment);
        let result = validator.validate(&scenario, None);

        assert!(result.errors.iter().any(|e| e.contains("parameters")));
        assert!(result.validation_score >= 0.0);
    }

    #[test]
    fn test_affordability_warning() {
        let validator = create_default_validator();
        let scenario = Scenario::new("e1", "Fund", ScenarioType::EmergencyFund)
            .with_param("monthlyContribution", 2_000)
            .with_param("targetAmount", 20_000);

        let result = validator.validate(&scenario, Some(&context()));
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.validation_score, 95.0);
    }

    #[test]
    fn test_score_floor() {
        assert_eq!(score(6, 3), 0.0);
    }
}

//! Parameter-sweep generation of scenario variants

use crate::models::{Scenario, ScenarioType};

/// A generated alternative of a base scenario
#[derive(Debug, Clone, PartialEq)]
pub struct Variation {
    pub label: String,
    pub scenario: Scenario,
}

/// Parameters scaled by the sweep and the labelled multipliers applied
fn sweep(scenario_type: ScenarioType) -> (&'static [&'static str], &'static [(&'static str, f64)]) {
    const THREE_WAY: &[(&str, f64)] = &[("conservative", 0.5), ("moderate", 1.0), ("aggressive", 1.5)];

    match scenario_type {
        ScenarioType::JobChange => (
            &["newSalary"],
            &[("conservative", 0.9), ("moderate", 1.0), ("aggressive", 1.15)],
        ),
        ScenarioType::CareerBreak => (&["durationMonths"], &[("conservative", 0.5), ("moderate", 1.0)]),
        ScenarioType::HomePurchase => (
            &["homePrice", "downPayment", "monthlyPayment"],
            &[("conservative", 0.8), ("moderate", 1.0)],
        ),
        ScenarioType::MajorPurchase => (
            &["purchasePrice", "downPayment", "monthlyPayment"],
            &[("conservative", 0.75), ("moderate", 1.0)],
        ),
        ScenarioType::DebtPayoff => (
            &["monthlyPayment"],
            &[("conservative", 0.75), ("moderate", 1.0), ("aggressive", 1.5)],
        ),
        ScenarioType::Investment | ScenarioType::EmergencyFund => (&["monthlyContribution"], THREE_WAY),
        ScenarioType::ExpenseChange => (&["monthlyChange"], &[("conservative", 0.5), ("moderate", 1.0)]),
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct VariationGenerator;

impl VariationGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Two or three variants of `base`, most cautious first
    pub fn generate(&self, base: &Scenario) -> Vec<Variation> {
        let (keys, multipliers) = sweep(base.scenario_type);

        multipliers
            .iter()
            .map(|(label, multiplier)| {
                let mut scenario = base.clone();
                scenario.id = format!("{}-{}", base.id, label);
                scenario.name = format!("{} ({})", base.name, label);

                for key in keys {
                    if let Some(value) = base.parameters.number(key) {
                        scenario.parameters.set(key, value * multiplier);
                    }
                }

                Variation {
                    label: label.to_string(),
                    scenario,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_type_yields_two_or_three_variants() {
        let generator = VariationGenerator::new();
        for scenario_type in ScenarioType::ALL {
            let base = Scenario::new("base", "Base", scenario_type)
                .with_param(scenario_type.primary_amount_key(), 1_000);
            let variants = generator.generate(&base);
            assert!((2..=3).contains(&variants.len()), "{}", scenario_type);
            assert!(variants.iter().any(|v| v.label == "moderate"));
        }
    }

    #[test]
    fn test_multipliers_applied() {
        let base = Scenario::new("inv", "Invest", ScenarioType::Investment)
            .with_param("monthlyContribution", 400)
            .with_param("expectedReturn", 0.07);

        let variants = VariationGenerator::new().generate(&base);
        let amounts: Vec<f64> = variants
            .iter()
            .map(|v| v.scenario.parameters.number("monthlyContribution").unwrap())
            .collect();

        assert_eq!(amounts, vec![200.0, 400.0, 600.0]);
        assert_eq!(variants[2].scenario.id, "inv-aggressive");
        assert_eq!(variants[0].scenario.parameters.number("expectedReturn"), Some(0.07));
    }

    #[test]
    fn test_missing_keys_are_left_alone() {
        let base = Scenario::new("h", "Home", ScenarioType::HomePurchase)
            .with_param("homePrice", 300_000);
        let variants = VariationGenerator::new().generate(&base);

        assert_eq!(variants[0].scenario.parameters.number("homePrice"), Some(240_000.0));
        assert!(variants[0].scenario.parameters.get("downPayment").is_none());
    }
}

//! Core data models for the scenario engine

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioType {
    JobChange,
    CareerBreak,
    HomePurchase,
    MajorPurchase,
    DebtPayoff,
    Investment,
    EmergencyFund,
    ExpenseChange,
}

impl ScenarioType {
    pub const ALL: [ScenarioType; 8] = [
        ScenarioType::JobChange,
        ScenarioType::CareerBreak,
        ScenarioType::HomePurchase,
        ScenarioType::MajorPurchase,
        ScenarioType::DebtPayoff,
        ScenarioType::Investment,
        ScenarioType::EmergencyFund,
        ScenarioType::ExpenseChange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioType::JobChange => "job_change",
            ScenarioType::CareerBreak => "career_break",
            ScenarioType::HomePurchase => "home_purchase",
            ScenarioType::MajorPurchase => "major_purchase",
            ScenarioType::DebtPayoff => "debt_payoff",
            ScenarioType::Investment => "investment",
            ScenarioType::EmergencyFund => "emergency_fund",
            ScenarioType::ExpenseChange => "expense_change",
        }
    }

    /// Parameter carrying the headline amount of a scenario of this type
    pub fn primary_amount_key(&self) -> &'static str {
        match self {
            ScenarioType::JobChange => "newSalary",
            ScenarioType::CareerBreak => "durationMonths",
            ScenarioType::HomePurchase => "homePrice",
            ScenarioType::MajorPurchase => "purchasePrice",
            ScenarioType::DebtPayoff => "monthlyPayment",
            ScenarioType::Investment | ScenarioType::EmergencyFund => "monthlyContribution",
            ScenarioType::ExpenseChange => "monthlyChange",
        }
    }
}

impl fmt::Display for ScenarioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimeHorizon {
    ShortTerm,
    MediumTerm,
    LongTerm,
}

impl TimeHorizon {
    /// Planning window in months
    pub fn months(&self) -> f64 {
        match self {
            TimeHorizon::ShortTerm => 12.0,
            TimeHorizon::MediumTerm => 36.0,
            TimeHorizon::LongTerm => 120.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Checking,
    Savings,
    Credit,
    Loan,
    Investment,
}

//
// ================= Scenario =================
//

/// Type-specific scenario parameters, keyed the way the UI submits them
/// (`newSalary`, `downPayment`, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ScenarioParameters(BTreeMap<String, Value>);

impl ScenarioParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Numeric view of a parameter; numeric strings are accepted.
    pub fn number(&self, key: &str) -> Option<f64> {
        let value = match self.0.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        value.filter(|v| v.is_finite())
    }

    pub fn number_or(&self, key: &str, default: f64) -> f64 {
        self.number(key).unwrap_or(default)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every parameter with a numeric reading, in key order
    pub fn numeric(&self) -> BTreeMap<&str, f64> {
        self.0
            .keys()
            .filter_map(|key| self.number(key).map(|value| (key.as_str(), value)))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub id: String,
    pub name: String,
    pub scenario_type: ScenarioType,
    #[serde(default)]
    pub parameters: ScenarioParameters,
    #[serde(default)]
    pub existing_scenarios: Vec<Scenario>,
}

impl Scenario {
    pub fn new(id: impl Into<String>, name: impl Into<String>, scenario_type: ScenarioType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            scenario_type,
            parameters: ScenarioParameters::new(),
            existing_scenarios: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.set(key, value);
        self
    }

    pub fn with_existing(mut self, existing: Vec<Scenario>) -> Self {
        self.existing_scenarios = existing;
        self
    }

    /// Headline amount used for fingerprinting and summaries
    pub fn primary_amount(&self) -> Option<f64> {
        self.parameters
            .number(self.scenario_type.primary_amount_key())
    }
}

//
// ================= Financial Context =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub kind: AccountKind,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinancialContext {
    pub current_balance: f64,
    pub monthly_income: f64,
    pub monthly_expenses: f64,
    #[serde(default)]
    pub accounts: Vec<Account>,
    pub risk_tolerance: RiskTolerance,
    pub time_horizon: TimeHorizon,
}

impl FinancialContext {
    pub fn new(current_balance: f64, monthly_income: f64, monthly_expenses: f64) -> Self {
        Self {
            current_balance,
            monthly_income,
            monthly_expenses,
            accounts: Vec::new(),
            risk_tolerance: RiskTolerance::Medium,
            time_horizon: TimeHorizon::MediumTerm,
        }
    }

    /// Income left over each month before any scenario is applied
    pub fn available_income(&self) -> f64 {
        self.monthly_income - self.monthly_expenses
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionRecord {
    pub date: NaiveDate,
    pub amount: f64,
    #[serde(default)]
    pub description: String,
}

//
// ================= Validation =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub validation_score: f64,
}

//
// ================= Financial Effects =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BalancePoint {
    pub month: u32,
    pub balance: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct CashFlowChanges {
    pub income_change: f64,
    pub expense_change: f64,
    pub savings_change: f64,
    pub net_change: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinancialEffects {
    pub monthly_impact: f64,
    pub yearly_impact: f64,
    pub balance_projection: Vec<BalancePoint>,
    pub affected_accounts: Vec<String>,
    pub cash_flow_changes: CashFlowChanges,
}

impl FinancialEffects {
    pub fn final_balance(&self) -> Option<f64> {
        self.balance_projection.last().map(|p| p.balance)
    }
}

//
// ================= Conflicts =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conflict {
    pub conflict_type: String,
    pub severity: Severity,
    pub description: String,
    pub scenario_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Synergy {
    pub synergy_type: String,
    pub description: String,
    pub scenario_ids: Vec<String>,
    pub impact: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConflictAnalysis {
    pub conflicts: Vec<Conflict>,
    pub synergies: Vec<Synergy>,
    pub compatibility_score: f64,
    pub recommendations: Vec<String>,
}

//
// ================= Monte Carlo =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Trial {
    pub monthly_impact: f64,
    pub final_balance: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TrialStatistics {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Percentiles {
    pub p05: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonteCarloResult {
    pub trials: Vec<Trial>,
    pub statistics: TrialStatistics,
    pub percentiles: Percentiles,
}

//
// ================= Feasibility =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeasibilityRiskBand {
    Low,
    Medium,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SustainabilityRating {
    Strong,
    Moderate,
    Weak,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ViabilityFactors {
    pub financial_capacity: f64,
    pub resource_availability: f64,
    pub timeline_realism: f64,
    pub risk_factor_score: f64,
    pub conflict_impact: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeasibilityAssessment {
    pub feasibility_score: f64,
    pub feasibility_risk_band: FeasibilityRiskBand,
    pub sustainability_rating: SustainabilityRating,
    pub viability_factors: ViabilityFactors,
}

//
// ================= Ranking =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CriteriaScores {
    pub roi: f64,
    pub risk: f64,
    pub liquidity: f64,
    pub sustainability: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedOption {
    pub scenario: Scenario,
    pub variant_label: String,
    pub monthly_impact: f64,
    pub criteria: CriteriaScores,
    pub base_score: f64,
    pub composite_score: f64,
    pub rank: usize,
    pub tier: Tier,
}

//
// ================= Recommendations =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Primary,
    Secondary,
    CreativeHybrid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub title: String,
    pub scenario_id: String,
    pub rationale: String,
    pub action_steps: Vec<String>,
    pub expected_monthly_impact: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InsightSource {
    Llm,
    RuleBased,
}

/// Response shape of the optional LLM collaborator
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LlmInsights {
    #[serde(default)]
    pub insights: String,
    #[serde(default)]
    pub optimizations: Vec<String>,
    #[serde(default)]
    pub alternatives: Vec<String>,
    #[serde(default)]
    pub risk_assessment: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecommendationSet {
    pub recommendations: Vec<Recommendation>,
    pub narrative: String,
    pub source: InsightSource,
    pub insights: Option<LlmInsights>,
}

//
// ================= Execution =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeError {
    pub phase: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseRecord {
    pub name: String,
    pub duration_ms: u64,
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionMetadata {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub phases: Vec<PhaseRecord>,
    pub errors: Vec<NodeError>,
}

impl ExecutionMetadata {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            phases: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl fmt::Display for RiskTolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskTolerance::Low => "Low",
            RiskTolerance::Medium => "Medium",
            RiskTolerance::High => "High",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for TimeHorizon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeHorizon::ShortTerm => "Short-Term",
            TimeHorizon::MediumTerm => "Medium-Term",
            TimeHorizon::LongTerm => "Long-Term",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        };
        write!(f, "{}", s)
    }
}

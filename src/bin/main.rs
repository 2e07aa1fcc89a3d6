use scenario_intelligence::{
    config::OrchestratorConfig,
    models::{Account, AccountKind, FinancialContext, RiskTolerance, Scenario, ScenarioType},
    orchestrator::{ExecuteOptions, Orchestrator, ProgressCallback, ProgressEvent},
    pipelines::PipelineInput,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Scenario engine starting");

    let config = OrchestratorConfig::from_env();
    let orchestrator = Orchestrator::from_config(config)?;

    info!(pipelines = ?orchestrator.pipelines(), "Pipelines registered");

    let mut context = FinancialContext::new(18_000.0, 7_200.0, 4_600.0);
    context.risk_tolerance = RiskTolerance::Medium;
    context.accounts = vec![
        Account {
            id: "chk".to_string(),
            name: "Checking".to_string(),
            kind: AccountKind::Checking,
            balance: 6_000.0,
        },
        Account {
            id: "sav".to_string(),
            name: "Savings".to_string(),
            kind: AccountKind::Savings,
            balance: 12_000.0,
        },
    ];

    let scenario = Scenario::new("debt-1", "Pay down credit card", ScenarioType::DebtPayoff)
        .with_param("debtAmount", 12_000)
        .with_param("monthlyPayment", 650)
        .with_existing(vec![Scenario::new("inv-1", "Index fund", ScenarioType::Investment)
            .with_param("monthlyContribution", 300)
            .with_param("expectedReturn", 0.07)]);

    let progress: ProgressCallback = Arc::new(|event: ProgressEvent| {
        info!(phase = %event.phase, percent = event.percent, "Progress");
    });

    for pipeline in ["scenario_analysis", "scenario_optimization"] {
        let input = PipelineInput::for_scenario(scenario.clone(), context.clone())
            .with_constraints(vec!["needs liquidity".to_string()]);

        let result = orchestrator
            .execute(pipeline, input, ExecuteOptions::default().with_progress(Arc::clone(&progress)))
            .await;

        println!("\n=== {} ===", pipeline);
        if let Some(metadata) = &result.metadata {
            println!("Summary: {}", metadata.summary);
            println!("Elapsed: {} ms (cached: {})", metadata.execution_time_ms, metadata.cached);
        }
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    Ok(())
}

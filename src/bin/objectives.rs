use clap::Parser;
use crm_insights::domain::model::Objectives;
use crm_insights::domain::ports::CrmSource;
use crm_insights::utils::error::CrmError;
use crm_insights::utils::logger;
use crm_insights::utils::validation::validate_url;
use crm_insights::ProxyClient;

#[derive(Parser)]
#[command(name = "objectives")]
#[command(about = "Show or update the monthly objectives stored by the CRM proxy")]
struct Args {
    #[arg(long, default_value = "http://localhost:3000/")]
    api_base_url: String,

    #[arg(long, env = "CRM_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Objective to update, e.g. `MONTHLY_LEADS_OBJ=40`. An empty value clears it.
    #[arg(long, value_name = "NAME=VALUE")]
    set: Vec<String>,

    #[arg(short, long)]
    verbose: bool,
}

fn parse_assignment(assignment: &str) -> Result<(String, Option<f64>), CrmError> {
    let (name, value) =
        assignment
            .split_once('=')
            .ok_or_else(|| CrmError::InvalidConfigValueError {
                field: "set".to_string(),
                value: assignment.to_string(),
                reason: "Expected NAME=VALUE".to_string(),
            })?;

    let value = match value.trim() {
        "" => None,
        raw => Some(raw.parse::<f64>().map_err(|e| CrmError::InvalidConfigValueError {
            field: name.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })?),
    };

    Ok((name.trim().to_string(), value))
}

fn print_objectives(objectives: &Objectives) {
    let values = serde_json::to_value(objectives).unwrap_or_default();
    for name in Objectives::NAMES {
        match values.get(name).and_then(|v| v.as_f64()) {
            Some(v) => println!("{:<32} {}", name, v),
            None => println!("{:<32} -", name),
        }
    }
}

async fn run(args: Args) -> Result<(), CrmError> {
    validate_url("api_base_url", &args.api_base_url)?;

    let mut client = ProxyClient::new(&args.api_base_url)?;
    if let Some(token) = args.api_token {
        client = client.with_token(token);
    }

    let mut objectives = client.objectives().await?;

    if !args.set.is_empty() {
        for assignment in &args.set {
            let (name, value) = parse_assignment(assignment)?;
            objectives.set(&name, value)?;
            tracing::info!("Setting {} to {:?}", name, value);
        }
        client.update_objectives(&objectives).await?;
        println!("✅ Objectives updated");
    }

    print_objectives(&objectives);
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    if let Err(e) = run(args).await {
        tracing::error!("❌ {} (Category: {:?})", e, e.category());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
        std::process::exit(1);
    }
}

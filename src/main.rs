use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use value_bet_analyst::analysis::batch::BatchOrchestrator;
use value_bet_analyst::analysis::extractor::MatchExtractor;
use value_bet_analyst::analysis::master::MasterAnalysis;
use value_bet_analyst::analysis::narrative::NarrativeSynthesizer;
use value_bet_analyst::analysis::quant::QuantAnalyzer;
use value_bet_analyst::analysis::single_match::SingleMatchAnalyzer;
use value_bet_analyst::auth::StaticSession;
use value_bet_analyst::betting::{ev, kelly};
use value_bet_analyst::config::{AppConfig, Secrets};
use value_bet_analyst::data::odds::OddsClient;
use value_bet_analyst::data::schedule::ScheduleClient;
use value_bet_analyst::llm::claude::ClaudeClient;
use value_bet_analyst::llm::LlmClient;
use value_bet_analyst::monitoring::logger::{self, LogFormat};
use value_bet_analyst::server::{self, AppState};
use value_bet_analyst::store::memory::MemoryProfileStore;
use value_bet_analyst::store::sqlite::Store;
use value_bet_analyst::store::ProfileStore;

#[derive(Debug, Parser)]
#[command(name = "value-bet-analyst", version, about = "Sports value-bet analysis service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API (default).
    Serve {
        /// Keep user profiles in memory instead of the database.
        #[arg(long)]
        ephemeral: bool,
    },
    /// Analyze a file of match text for one user, charging their quota.
    Batch {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        user: String,
        #[arg(long)]
        sport: Option<String>,
    },
    /// Print upcoming fixtures.
    Schedule {
        #[arg(long)]
        days: Option<u32>,
    },
    /// EV and Kelly stake for one outcome.
    ValueBet {
        #[arg(long)]
        probability: Decimal,
        #[arg(long)]
        odds: Decimal,
        #[arg(long)]
        bankroll: Option<Decimal>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, secrets) = AppConfig::load()?;

    let command = cli.command.unwrap_or(Command::Serve { ephemeral: false });
    let format = match command {
        Command::Serve { .. } => LogFormat::Json,
        _ => LogFormat::Compact,
    };
    logger::init_logging(&config.monitoring, format)?;

    match command {
        Command::Serve { ephemeral } => run_server(config, secrets, ephemeral).await,
        Command::Batch { file, user, sport } => {
            run_batch(config, secrets, file, user, sport).await
        }
        Command::Schedule { days } => run_schedule(config, secrets, days).await,
        Command::ValueBet {
            probability,
            odds,
            bankroll,
        } => run_value_bet(&config, probability, odds, bankroll),
    }
}

fn build_llm(config: &AppConfig, secrets: &Secrets, store: &Store) -> Result<Option<Arc<dyn LlmClient>>> {
    let Some(key) = secrets.anthropic_api_key.clone() else {
        tracing::warn!("ANTHROPIC_API_KEY not set, LLM-backed endpoints disabled");
        return Ok(None);
    };
    let client = ClaudeClient::new(key, &config.llm, Some(store.clone()))
        .context("Failed to create Claude client")?;
    Ok(Some(Arc::new(client)))
}

fn build_schedule(config: &AppConfig, secrets: &Secrets) -> Result<Option<ScheduleClient>> {
    let Some(key) = secrets.schedule_api_key.clone() else {
        tracing::warn!("SCHEDULE_API_KEY not set, schedule disabled");
        return Ok(None);
    };
    let client = ScheduleClient::new(key, &config.schedule_api, &config.rate_limit)
        .context("Failed to create schedule client")?;
    Ok(Some(client))
}

fn build_batch(
    config: &AppConfig,
    llm: Arc<dyn LlmClient>,
    profiles: Arc<dyn ProfileStore>,
) -> BatchOrchestrator {
    BatchOrchestrator::new(
        MatchExtractor::new(llm.clone()),
        SingleMatchAnalyzer::new(llm),
        profiles,
        config.quota.clone(),
    )
}

async fn run_server(config: AppConfig, secrets: Secrets, ephemeral: bool) -> Result<()> {
    tracing::info!(
        bind = %config.server.bind,
        port = config.server.port,
        ephemeral,
        "Value bet analyst starting"
    );

    let store = Store::new(&config.database.path)
        .await
        .context("Failed to open database")?;
    let profiles: Arc<dyn ProfileStore> = if ephemeral {
        Arc::new(MemoryProfileStore::new())
    } else {
        Arc::new(store.clone())
    };

    let mut state = AppState::new(
        store.clone(),
        profiles.clone(),
        config.scoring.clone(),
        config.betting.clone(),
        config.quota.clone(),
        config.schedule_api.lookahead_days,
    );

    if let Some(llm) = build_llm(&config, &secrets, &store)? {
        let mut master = MasterAnalysis::new(
            QuantAnalyzer::new(llm.clone(), config.scoring.preferred_model.clone()),
            NarrativeSynthesizer::new(llm.clone()),
            config.scoring.clone(),
            config.betting.clone(),
        )
        .with_history(store.clone());

        match secrets.odds_api_key.clone() {
            Some(key) => {
                let odds = OddsClient::new(key, &config.odds_api, &config.rate_limit)
                    .context("Failed to create odds client")?;
                master = master.with_odds(Arc::new(odds));
            }
            None => tracing::warn!("ODDS_API_KEY not set, analyses use submitted odds only"),
        }

        state = state
            .with_batch(build_batch(&config, llm, profiles))
            .with_master(master);
    }

    if let Some(schedule) = build_schedule(&config, &secrets)? {
        state = state.with_schedule(schedule);
    }

    server::serve(state, &config.server.bind, config.server.port).await
}

async fn run_batch(
    config: AppConfig,
    secrets: Secrets,
    file: PathBuf,
    user: String,
    sport: Option<String>,
) -> Result<()> {
    let text = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let store = Store::new(&config.database.path)
        .await
        .context("Failed to open database")?;
    let llm = build_llm(&config, &secrets, &store)?
        .context("ANTHROPIC_API_KEY is required for batch analysis")?;

    let batch = build_batch(&config, llm, Arc::new(store.clone()));
    let result = batch
        .calculate_batch_value_bets(&StaticSession::user(user), &text, sport.as_deref())
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn run_schedule(config: AppConfig, secrets: Secrets, days: Option<u32>) -> Result<()> {
    let client = build_schedule(&config, &secrets)?
        .context("SCHEDULE_API_KEY is required for the schedule")?;
    let days = days.unwrap_or(config.schedule_api.lookahead_days);

    for m in client.fetch_upcoming(days).await {
        let odds = m
            .odds
            .map(|o| {
                let draw = o.draw.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
                format!("{} / {} / {}", o.home, draw, o.away)
            })
            .unwrap_or_default();
        println!(
            "{}  {:<24} {} vs {}  {}",
            m.start_time.format("%Y-%m-%d %H:%M"),
            m.league,
            m.home_team,
            m.away_team,
            odds
        );
    }
    Ok(())
}

fn run_value_bet(
    config: &AppConfig,
    probability: Decimal,
    odds: Decimal,
    bankroll: Option<Decimal>,
) -> Result<()> {
    let expected_value = ev::expected_value(probability, odds);
    let stake = kelly::kelly_stake(probability, odds, &config.betting);

    println!("EV:           {}", expected_value.round_dp(4));
    println!(
        "Value bet:    {}",
        ev::is_value_bet(expected_value, config.betting.value_threshold)
    );
    println!("Kelly (full): {}", stake.kelly_raw.round_dp(4));
    println!(
        "Stake:        {}{}",
        stake.stake_fraction,
        if stake.capped { " (capped)" } else { "" }
    );
    if let Some(bankroll) = bankroll {
        println!("Amount:       {}", kelly::stake_amount(&stake, bankroll));
    }
    Ok(())
}

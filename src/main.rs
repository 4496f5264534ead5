use alloy::primitives::Address;
use alloy::providers::Provider;
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{info, warn, LevelFilter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use superfluid_pools_client::config::Config;
use superfluid_pools_client::models::token::to_human_amount;
use superfluid_pools_client::models::{parse_pool_id, Pool};
use superfluid_pools_client::providers::{
    create_provider, load_signer, AlloyChainReader, AlloyWallet, ChainReader, Wallet,
};
use superfluid_pools_client::services::{
    AllowanceTracker, ApprovalStep, FundingRequest, FundingStep, FundingWorkflow,
    NotificationHandler, PoolActions, PoolLookup, PoolService, StreamForm, TxLifecycle,
    TxObserver,
};
use superfluid_pools_client::utils::{
    format_address, format_flow_rate, format_token_amount, truncate_string,
};

const NOT_FOUND_EXIT_CODE: i32 = 2;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List all pools with the caller's units
    Pools {
        #[arg(long)]
        json: bool,
    },
    /// Show a single pool
    Pool {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Pools the caller holds units in, with share and estimated rewards
    Rewards {
        #[arg(long)]
        json: bool,
    },
    /// Create a pool for the distribution token
    CreatePool {
        #[arg(long)]
        name: String,
        #[arg(long)]
        symbol: String,
    },
    /// Fund a pool, approving the distributor first if needed
    Fund {
        id: String,
        #[command(subcommand)]
        mode: FundMode,
    },
    /// Collect units in a pool
    Collect { id: String },
    /// Give up units in a pool
    Decrease { id: String },
    /// Show balance and allowance of the distribution token
    Allowance,
    /// Approve the distributor for exactly this amount
    Approve {
        #[arg(long)]
        amount: String,
    },
}

#[derive(Subcommand, Debug)]
enum FundMode {
    /// One-off distribution
    Airdrop {
        #[arg(long)]
        amount: String,
    },
    /// Streamed distribution; give any two of the three values
    Stream {
        /// Tokens per second
        #[arg(long)]
        flow_rate: Option<String>,
        /// Seconds
        #[arg(long)]
        duration: Option<String>,
        #[arg(long)]
        total_amount: Option<String>,
    },
}

/// Everything the subcommands need, built once from the config.
struct App {
    config: Config,
    reader: Arc<dyn ChainReader>,
    observer: TxObserver,
    pools: Arc<PoolService>,
    account: Option<Address>,
    distributor: Address,
    super_token: Address,
}

impl App {
    async fn new(config: Config) -> Result<Self> {
        let distributor = config.distributor()?;
        let signer = config
            .wallet
            .private_key
            .as_deref()
            .map(load_signer)
            .transpose()?;

        let (provider, signing_account) = match signer {
            Some((wallet, account)) => {
                info!("Using signer {:?}", account);
                (
                    create_provider(&config.network.rpc_urls, Some(wallet))?,
                    Some(account),
                )
            }
            None => (create_provider(&config.network.rpc_urls, None)?, None),
        };
        let account = signing_account.or(config.wallet_address()?);

        let chain_id = provider
            .get_chain_id()
            .await
            .context("Failed to reach the RPC endpoint")?;
        if chain_id != config.network.chain_id {
            warn!(
                "Connected to chain {} but config expects {}",
                chain_id, config.network.chain_id
            );
        }

        let reader: Arc<dyn ChainReader> =
            Arc::new(AlloyChainReader::new(provider.clone(), distributor));
        let super_token = match config.super_token()? {
            Some(token) => token,
            None => reader
                .super_token()
                .await
                .context("Failed to read the distribution token")?,
        };
        info!("Distributor {:?}, token {:?}", distributor, super_token);

        let wallet: Arc<dyn Wallet> = Arc::new(AlloyWallet::new(
            provider,
            signing_account,
            distributor,
            Duration::from_millis(config.network.receipt_poll_interval_ms),
        ));
        let notifier = Arc::new(NotificationHandler::from_config(&config.telegram));
        let observer = TxObserver::new(wallet, notifier);
        let pools = Arc::new(PoolService::new(reader.clone(), account));

        Ok(Self {
            config,
            reader,
            observer,
            pools,
            account,
            distributor,
            super_token,
        })
    }

    fn tracker(&self) -> AllowanceTracker {
        AllowanceTracker::new(
            self.reader.clone(),
            self.super_token,
            self.account,
            self.distributor,
        )
    }

    fn pool_actions(&self) -> PoolActions {
        PoolActions::new(self.observer.clone(), self.pools.clone(), self.super_token)
    }

    async fn run(&self, command: Command) -> Result<i32> {
        match command {
            Command::Pools { json } => {
                let pools = self.pools.list_pools().await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&pools)?);
                } else if pools.is_empty() {
                    println!("No pools yet");
                } else {
                    pools.iter().for_each(print_pool);
                }
            }
            Command::Pool { id, json } => {
                let pool_id = parse_pool_id(&id)?;
                match self.pools.get_pool(pool_id).await? {
                    PoolLookup::Found(pool) if json => {
                        println!("{}", serde_json::to_string_pretty(&pool)?)
                    }
                    PoolLookup::Found(pool) => print_pool(&pool),
                    PoolLookup::NotFound(id) => {
                        eprintln!("Pool {} not found", id);
                        return Ok(NOT_FOUND_EXIT_CODE);
                    }
                }
            }
            Command::Rewards { json } => {
                if self.account.is_none() {
                    return Err(anyhow!("Rewards need wallet.address or PRIVATE_KEY"));
                }
                let rewards = self.pools.rewards().await?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&rewards)?);
                } else if rewards.is_empty() {
                    println!("No units held in any pool");
                } else {
                    for reward in &rewards {
                        let pool = &reward.pool;
                        println!(
                            "#{} {} ({}): {:.2}% of {} units, {} {}",
                            pool.id,
                            truncate_string(&pool.name, 30),
                            pool.symbol,
                            reward.share_percent,
                            pool.total_units,
                            format_flow_rate(reward.rewards_per_second, pool.token.decimals),
                            pool.token.symbol
                        );
                    }
                }
            }
            Command::CreatePool { name, symbol } => {
                let lifecycle = self.pool_actions().create_pool(&name, &symbol).await?;
                report(&lifecycle)?;
            }
            Command::Fund { id, mode } => {
                let pool_id = parse_pool_id(&id)?;
                let mut workflow = FundingWorkflow::new(
                    self.tracker(),
                    ApprovalStep::new(self.observer.clone(), self.super_token),
                    FundingStep::new(self.observer.clone()),
                    self.config.funding.approval_buffer_percent,
                )
                .with_pools(self.pools.clone());

                let request = match mode {
                    FundMode::Airdrop { amount } => FundingRequest::airdrop(amount),
                    FundMode::Stream {
                        flow_rate,
                        duration,
                        total_amount,
                    } => {
                        let state = workflow.tracker_mut().refetch().await?;
                        let form = StreamForm::from_inputs(
                            state.decimals,
                            flow_rate.as_deref(),
                            duration.as_deref(),
                            total_amount.as_deref(),
                        )?;
                        let resolved = form.resolve()?;
                        println!(
                            "Streaming {} over {}s ({} per second)",
                            to_human_amount(resolved.total_raw, state.decimals),
                            resolved.duration,
                            to_human_amount(resolved.flow_rate_raw, state.decimals)
                        );
                        FundingRequest::Stream(form)
                    }
                };

                let outcome = workflow.fund(pool_id, &request).await?;
                if let Some(approval) = &outcome.approval {
                    report(approval)?;
                }
                match &outcome.funding {
                    Some(funding) => report(funding)?,
                    None => return Err(anyhow!("Pool {} was not funded", pool_id)),
                }
                if let (Some(distribution), Some(decimals)) =
                    (&outcome.distribution, workflow.tracker().decimals())
                {
                    info!("Distribution recorded: {:?}", distribution);
                    println!(
                        "Distributed {} to pool {}{}",
                        format_token_amount(distribution.amount, decimals, 4),
                        distribution.pool_id,
                        if distribution.is_streaming {
                            " as a stream"
                        } else {
                            ""
                        }
                    );
                }
            }
            Command::Collect { id } => {
                let lifecycle = self.pool_actions().collect_units(parse_pool_id(&id)?).await?;
                report(&lifecycle)?;
            }
            Command::Decrease { id } => {
                let lifecycle = self
                    .pool_actions()
                    .decrease_units(parse_pool_id(&id)?)
                    .await?;
                report(&lifecycle)?;
            }
            Command::Allowance => {
                let mut tracker = self.tracker();
                tracker.refetch().await?;
                println!(
                    "Balance:   {}",
                    tracker.formatted_balance().unwrap_or_default()
                );
                println!(
                    "Allowance: {} (spender {})",
                    tracker.formatted_allowance().unwrap_or_default(),
                    format_address(&self.distributor)
                );
            }
            Command::Approve { amount } => {
                let mut tracker = self.tracker();
                tracker.refetch().await?;
                if !tracker.has_sufficient_balance(&amount) {
                    warn!(
                        "Approving {} above the current balance of {}",
                        amount,
                        tracker.formatted_balance().unwrap_or_default()
                    );
                }
                let step = ApprovalStep::new(self.observer.clone(), self.super_token);
                let lifecycle = step.approve(self.distributor, &amount, &mut tracker).await?;
                report(&lifecycle)?;
                if let Some(allowance) = tracker.formatted_allowance() {
                    println!("Allowance is now {}", allowance);
                }
            }
        }
        Ok(0)
    }
}

fn print_pool(pool: &Pool) {
    println!(
        "#{} {} ({}) {}",
        pool.id,
        truncate_string(&pool.name, 30),
        pool.symbol,
        format_address(&pool.address)
    );
    println!(
        "    flow {} {}, units {}/{} ({:.2}%)",
        format_flow_rate(pool.flow_rate, pool.token.decimals),
        pool.token.symbol,
        pool.user_units,
        pool.total_units,
        pool.user_share_percent()
    );
    if pool.is_member() {
        let rewards = format_flow_rate(pool.estimated_rewards_per_second(), pool.token.decimals);
        println!("    your rewards {} {}", rewards, pool.token.symbol);
    }
}

/// Prints a confirmed transaction or turns the failure into an error.
fn report(lifecycle: &TxLifecycle) -> Result<()> {
    let receipt = lifecycle.clone().into_result()?;
    println!(
        "{}: confirmed {:?} (gas {})",
        lifecycle.action(),
        receipt.hash,
        receipt.gas_used
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse command line arguments and setup logging
    let args = Args::parse();
    let log_level = match args.log_level.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level.to_string())).init();

    // 2. Load configuration and connect
    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    let app = App::new(config).await?;

    // 3. Run the requested command
    let code = app.run(args.command).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

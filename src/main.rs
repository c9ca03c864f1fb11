use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use savings_vault::{
    config, AccountId, Amount, BlockClock, ContractError, LedgerSnapshot, MemoryHost, RewardParams,
    SavingsContract, SavingsLedger,
};

#[derive(Parser)]
#[command(name = "savings", version, about = "Time-locked savings ledger")]
struct Cli {
    /// State file holding the simulated host and the ledger snapshot
    #[arg(long, default_value = "savings-state.json")]
    state: PathBuf,

    /// Optional JSON file overriding reward parameters
    #[arg(long)]
    params: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Credit a wallet on the simulated host
    Fund {
        #[arg(long)]
        account: AccountId,
        #[arg(long)]
        amount: Amount,
    },
    /// Add to the vault's reward reserve
    FundVault {
        #[arg(long)]
        amount: Amount,
    },
    /// Lock funds for a number of months
    Lock {
        #[arg(long)]
        account: AccountId,
        #[arg(long)]
        amount: Amount,
        #[arg(long)]
        months: u32,
    },
    /// Withdraw a matured lock with its reward
    Withdraw {
        #[arg(long)]
        account: AccountId,
    },
    /// Advance the block height
    Advance {
        #[arg(long)]
        blocks: u64,
    },
    /// Locked principal of an account
    Balance {
        #[arg(long)]
        account: AccountId,
    },
    /// Maturity height of an account's lock
    LockTime {
        #[arg(long)]
        account: AccountId,
    },
    /// Reward for an amount over a duration in blocks
    Reward {
        #[arg(long)]
        amount: Amount,
        #[arg(long)]
        duration: u64,
    },
    /// Annual reward rate in percent
    Rate,
    /// Blocks per year used by the reward formula
    AnnualBlocks,
    /// Dump host and ledger state
    Status,
}

#[derive(Default, Serialize, Deserialize)]
struct SavingsState {
    host: MemoryHost,
    ledger: Option<LedgerSnapshot>,
}

fn load_state(path: &Path) -> Result<SavingsState> {
    if !path.exists() {
        return Ok(SavingsState::default());
    }
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))
}

fn save_state(path: &Path, state: &SavingsState) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
    }
    let json = serde_json::to_vec_pretty(state)?;
    fs::write(path, json).with_context(|| format!("write {}", path.display()))
}

fn open_contract(state: SavingsState, params: RewardParams) -> Result<SavingsContract<MemoryHost>> {
    let ledger = match state.ledger {
        Some(snapshot) => SavingsLedger::restore(snapshot, params)
            .map_err(|err| anyhow::anyhow!("error {}: {err}", err.code()))?,
        None => SavingsLedger::with_params(params),
    };
    Ok(SavingsContract::with_ledger(ledger, state.host))
}

fn contract_failure(err: ContractError) -> anyhow::Error {
    anyhow::anyhow!("error {}: {err}", err.code())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("savings_vault=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let params = match &cli.params {
        Some(path) => config::load_params(path)
            .with_context(|| format!("load params {}", path.display()))?,
        None => RewardParams::default(),
    };
    let mut contract = open_contract(load_state(&cli.state)?, params)?;

    match cli.command {
        Command::Fund { account, amount } => {
            contract
                .host_mut()
                .credit(&account, amount)
                .map_err(|err| anyhow::anyhow!("error {}: {err}", err.code()))?;
            println!("{account}: {}", contract.host().wallet_balance(&account));
        }
        Command::FundVault { amount } => {
            contract
                .host_mut()
                .fund_vault(amount)
                .map_err(|err| anyhow::anyhow!("error {}: {err}", err.code()))?;
            println!("vault: {}", contract.host().vault_balance());
        }
        Command::Lock {
            account,
            amount,
            months,
        } => {
            let receipt = contract
                .lock(&account, amount, months)
                .map_err(contract_failure)?;
            println!(
                "locked {} for {account} until block {}",
                receipt.amount, receipt.lock_until
            );
        }
        Command::Withdraw { account } => {
            let payout = contract.withdraw(&account).map_err(contract_failure)?;
            println!("withdrew {payout} to {account}");
        }
        Command::Advance { blocks } => {
            println!("height: {}", contract.host_mut().advance(blocks));
        }
        Command::Balance { account } => println!("{}", contract.get_balance(&account)),
        Command::LockTime { account } => println!("{}", contract.get_lock_time(&account)),
        Command::Reward { amount, duration } => {
            let reward = contract
                .calculate_reward(amount, duration)
                .map_err(|err| anyhow::anyhow!("error {}: {err}", err.code()))?;
            println!("{reward}");
        }
        Command::Rate => println!("{}", contract.get_reward_rate()),
        Command::AnnualBlocks => println!("{}", contract.get_annual_blocks()),
        Command::Status => {
            let snapshot = contract.snapshot();
            let status = serde_json::json!({
                "height": contract.host().block_height(),
                "vault": contract.host().vault_balance(),
                "locks": snapshot.records,
                "state_root": hex::encode(snapshot.state_root),
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
            return Ok(());
        }
    }

    let (ledger, host) = contract.into_parts();
    save_state(
        &cli.state,
        &SavingsState {
            host,
            ledger: Some(ledger.snapshot()),
        },
    )
}

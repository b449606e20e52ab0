//! Prove and finalize OP Stack withdrawals from the command line.
//!
//! - `status`: derive the lifecycle state of a withdrawal
//! - `watch`: follow a withdrawal until it needs action
//! - `prove`: submit the proof to L1 (or print it with `--dry-run`)
//! - `finalize`: execute a proven withdrawal after the challenge period
//! - `history`: list an account's recent bridge transfers

use alloy_primitives::{Address, TxHash};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use withdrawal::{status::unix_now, WithdrawalError};
use withdrawer::{
    config::Config,
    metrics::{install_prometheus_exporter, Metrics},
    render_history, render_status, Withdrawer,
};

#[derive(Parser)]
#[command(name = "withdrawer")]
#[command(about = "Prove and finalize OP Stack L2→L1 withdrawals")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Serve Prometheus metrics on this port
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the status of the withdrawal initiated by an L2 transaction
    Status {
        /// Hash of the L2 transaction that initiated the withdrawal
        tx_hash: TxHash,
    },

    /// Follow a withdrawal until it can be proven or finalized
    Watch { tx_hash: TxHash },

    /// Prove a withdrawal on L1
    Prove {
        tx_hash: TxHash,

        /// Private key for signing transactions (hex string, with or without 0x prefix)
        #[arg(
            short = 'k',
            long,
            env = "PRIVATE_KEY",
            hide_env_values = true,
            required_unless_present = "dry_run"
        )]
        private_key: Option<String>,

        /// Build and print the proof without submitting it
        #[arg(long)]
        dry_run: bool,
    },

    /// Finalize a proven withdrawal on L1
    Finalize {
        tx_hash: TxHash,

        /// Private key for signing transactions (hex string, with or without 0x prefix)
        #[arg(short = 'k', long, env = "PRIVATE_KEY", hide_env_values = true)]
        private_key: String,
    },

    /// List recent deposits and withdrawals of an account
    History { account: Address },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Log the user-facing explanation next to the raw error.
fn report(err: WithdrawalError) -> eyre::Report {
    error!(
        error = %err,
        retryable = err.is_retryable(),
        "{}",
        err.user_message()
    );
    err.into()
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    if let Some(port) = cli.metrics_port {
        install_prometheus_exporter(port)?;
        info!(port, "Serving metrics");
    }

    let config = Config::from_file(&cli.config)?;
    info!(
        network = ?config.network,
        l1_rpc_url = %config.l1_rpc_url,
        l2_rpc_url = %config.l2_rpc_url,
        "Loaded config"
    );

    let withdrawer = Withdrawer::connect(&config, Metrics::new()).await?;
    let period = withdrawer.settings().challenge_period_secs;

    match cli.command {
        Command::Status { tx_hash } => {
            let status = withdrawer.status(tx_hash).await;
            print!("{}", render_status(&status, unix_now(), period));
        }
        Command::Watch { tx_hash } => {
            let mut last = String::new();
            let watch = withdrawer.watch(tx_hash, |status| {
                let state = status.state.name().to_string();
                if state != last {
                    print!("{}", render_status(status, unix_now(), period));
                    last = state;
                }
            });

            tokio::select! {
                status = watch => {
                    info!(state = %status.state, "Watch finished");
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                }
            }
        }
        Command::Prove {
            tx_hash,
            private_key,
            dry_run,
        } => {
            if dry_run {
                info!("Mode: DRY-RUN (no transactions will be executed)");
                let prepared = withdrawer.prove_dry_run(tx_hash).await.map_err(report)?;
                println!("withdrawal     {}", prepared.withdrawal.hash);
                println!("game index     {}", prepared.params.dispute_game_index);
                println!("anchor block   {}", prepared.anchor.l2_block);
                println!(
                    "state root     {}",
                    prepared.params.output_root_proof.stateRoot
                );
                println!(
                    "storage root   {}",
                    prepared.params.output_root_proof.messagePasserStorageRoot
                );
                println!(
                    "block hash     {}",
                    prepared.params.output_root_proof.latestBlockhash
                );
                for node in &prepared.params.withdrawal_proof {
                    println!("proof node     {node}");
                }
            } else {
                let private_key =
                    private_key.ok_or_else(|| eyre::eyre!("private key required to prove"))?;
                let writer = withdrawer.writer(&private_key)?;
                let outcome = withdrawer.prove(tx_hash, writer).await.map_err(report)?;
                println!("proven in {} (block {:?})", outcome.tx_hash, outcome.block_number);
            }
        }
        Command::Finalize {
            tx_hash,
            private_key,
        } => {
            let writer = withdrawer.writer(&private_key)?;
            let outcome = withdrawer.finalize(tx_hash, writer).await.map_err(report)?;
            println!(
                "finalized in {} (block {:?})",
                outcome.tx_hash, outcome.block_number
            );
        }
        Command::History { account } => {
            let transfers = withdrawer.history(account).await.map_err(report)?;
            if transfers.is_empty() {
                println!("no bridge transfers in the recent window");
            } else {
                print!("{}", render_history(&transfers));
            }
        }
    }

    Ok(())
}

use std::{fs::File, sync::Arc};

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use wallet_ledger::{
    AccountRegistry, RegistryConfig, SystemClock, TransferMode,
    bin_utils::{ProcessError, Report, Service},
};

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let filename = args
        .next()
        .context("Expected a file name as the first argument")?;
    let report = match args.next().as_deref() {
        None | Some("balances") => Report::Balances,
        Some("history") => Report::History,
        Some(other) => {
            anyhow::bail!("Unknown report `{other}`, expected `balances` or `history`")
        }
    };
    let transfer_mode = match std::env::var("LEDGER_TRANSFER_MODE") {
        Ok(mode) => mode
            .parse::<TransferMode>()
            .context("Invalid LEDGER_TRANSFER_MODE environment variable")?,
        Err(_) => TransferMode::default(),
    };
    tracing::debug!(?transfer_mode, ?report, "starting replay of `{filename}`");

    let file = File::open(&filename).with_context(|| format!("Failed to open `{filename}`"))?;

    let service = Service {
        input: file,
        output: &mut std::io::stdout(),
        registry: AccountRegistry::with_config(
            RegistryConfig { transfer_mode },
            Arc::new(SystemClock),
        ),
        report,
        error_printer: Box::new(|line, err| {
            match err {
                ProcessError::LedgerErr(err) => {
                    // rejected operations are expected, not technical errors
                    tracing::debug!(line, %err, "operation rejected");
                }
                err => eprintln!("Error at line {line}: {err}"),
            }
        }),
    };
    service.run()
}

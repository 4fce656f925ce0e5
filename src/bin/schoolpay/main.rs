//! schoolpay CLI entry point.

mod cli;

use clap::Parser;
use cli::{Cli, Command};
use color_eyre::eyre::eyre;
use schoolpay::context::ActorContext;
use schoolpay::identity::IdentityResolver;
use schoolpay::ledger::{HttpLedgerClient, LedgerService};
use schoolpay::money::Money;
use schoolpay::payment::charge;
use schoolpay::qr::{QrPayload, Role};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = cli.client_config()?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("schoolpay v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::ParsePayload { payload } => {
            let raw = match payload {
                Some(raw) => raw,
                None => read_stdin()?,
            };
            let payload =
                QrPayload::parse(raw.trim()).map_err(|e| eyre!("{}", e.user_message()))?;
            println!("{} {}", payload.role(), payload.id());
        }
        Command::EncodePayload { role, id } => {
            let payload = QrPayload::for_account(role.into(), id.trim());
            println!("{}", payload.encode());
        }
        Command::Identity { role, id } => {
            let ledger = HttpLedgerClient::new(&config.ledger)?;
            let identity = ledger.get_identity(role.into(), &id).await?;
            println!("{} {} ({})", identity.role.title(), identity.id, identity.display_name);
            if let Some(upi_id) = identity.upi_id {
                println!("UPI: {upi_id}");
            }
            println!("Balance: {}", identity.balance);
        }
        Command::Transactions { role, id, limit } => {
            let ledger = HttpLedgerClient::new(&config.ledger)?;
            let transactions = ledger.list_transactions(role.into(), &id).await?;
            let shown = limit.unwrap_or(transactions.len());
            for txn in transactions.iter().take(shown) {
                println!(
                    "{}  {:>10}  {:<9}  {:<10}  {}",
                    txn.timestamp.format("%Y-%m-%d %H:%M"),
                    txn.amount,
                    txn.status.as_str(),
                    txn.counterparty_id.as_deref().unwrap_or("-"),
                    txn.description.as_deref().unwrap_or(""),
                );
            }
        }
        Command::Charge {
            vendor,
            student,
            amount,
            description,
        } => {
            let ledger: Arc<dyn LedgerService> = Arc::new(HttpLedgerClient::new(&config.ledger)?);
            let amount = Money::parse(&amount).map_err(|e| eyre!("{e}"))?;
            let resolver = IdentityResolver::new(Arc::clone(&ledger));
            let student = resolver
                .resolve(&QrPayload::for_account(Role::Student, student.trim()), Role::Student)
                .await
                .map_err(|e| eyre!("{}", e.user_message()))?;

            let context = ActorContext::Vendor { vendor_id: vendor };
            let receipt = charge(
                ledger.as_ref(),
                &context,
                Some(&student),
                amount,
                description.as_deref(),
            )
            .await
            .map_err(|e| eyre!("{}", e.user_message()))?;
            println!("Charged {} {amount}", student.display_name);
            println!("Student balance: {}", receipt.student_balance);
            println!("Vendor balance: {}", receipt.vendor_balance);
        }
        Command::QrCode { role, id, out } => {
            let ledger = HttpLedgerClient::new(&config.ledger)?;
            let image = ledger.get_qr_code(role.into(), &id).await?;
            write_output(&image.data_url, out)?;
        }
    }

    Ok(())
}

fn read_stdin() -> color_eyre::Result<String> {
    let mut buf = String::new();
    std::io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn write_output(content: &str, out: Option<PathBuf>) -> color_eyre::Result<()> {
    if let Some(path) = out {
        std::fs::write(path, content)?;
        return Ok(());
    }

    let mut stdout = std::io::stdout();
    stdout.write_all(content.as_bytes())?;
    stdout.write_all(b"\n")?;
    Ok(())
}

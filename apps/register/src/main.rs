//! # despos-register
//!
//! Rings up one cash sale from the command line and prints its receipt as
//! JSON.
//!
//! ## Usage
//! ```bash
//! # Two of one product, one of another, paid in full
//! despos-register --customer <CONTACT_ID> <PRODUCT_ID>:2 <PRODUCT_ID>
//!
//! # Tender a specific amount (in centavos)
//! despos-register --customer <CONTACT_ID> --tender 100000 <PRODUCT_ID>
//!
//! # Store as pending instead of finishing
//! despos-register --pending <PRODUCT_ID>
//!
//! # Refund a stored sale
//! despos-register --refund <SALE_ID>
//! ```
//!
//! Configuration comes from `RegisterConfig::load()`; `--db` overrides the
//! database path.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use despos_core::{Money, PaymentMethod};
use despos_register::{connect, ApiError, ApiResult, RegisterConfig, RegisterSession, SaleSummary};
use tracing::error;

#[derive(Debug, Default)]
struct Args {
    db: Option<PathBuf>,
    customer: Option<String>,
    tender: Option<i64>,
    pending: bool,
    refund: Option<String>,
    /// (product id, quantity)
    lines: Vec<(String, i64)>,
}

#[tokio::main]
async fn main() -> ExitCode {
    despos_db::init_tracing();

    let args = match parse_args(env::args().skip(1).collect()) {
        Ok(Some(args)) => args,
        Ok(None) => return ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::FAILURE;
        }
    };

    match run(args).await {
        Ok(summary) => match serde_json::to_string_pretty(&summary) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Could not render receipt: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            error!(code = ?e.code, "{}", e.message);
            if let Ok(json) = serde_json::to_string(&e) {
                eprintln!("{}", json);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> ApiResult<SaleSummary> {
    let mut config = RegisterConfig::load()?;
    if let Some(db) = args.db {
        config.database_path = Some(db);
    }

    let db = connect(&config).await?;
    let mut session = RegisterSession::new(db, config.discard_on_success);

    if let Some(sale_id) = args.refund {
        session.open_sale(&sale_id).await?;
        return session.refund().await;
    }

    if args.lines.is_empty() {
        return Err(ApiError::validation("No products given"));
    }

    for (product_id, quantity) in &args.lines {
        session.add_product(product_id).await?;
        if *quantity != 1 {
            session.set_quantity(product_id, *quantity)?;
        }
    }

    if args.pending {
        return session.save().await;
    }

    session.select_customer(args.customer.as_deref()).await?;
    session.set_payment_method(Some(PaymentMethod::Cash));
    let amount = match args.tender {
        Some(cents) => Money::from_cents(cents),
        None => session.draft().total_due,
    };
    session.tender(amount);

    session.finish().await
}

/// `Ok(None)` means help was printed.
fn parse_args(raw: Vec<String>) -> Result<Option<Args>, String> {
    let mut args = Args::default();
    let mut iter = raw.into_iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--db" | "-d" => {
                args.db = Some(PathBuf::from(value(&mut iter, &arg)?));
            }
            "--customer" | "-c" => {
                args.customer = Some(value(&mut iter, &arg)?);
            }
            "--tender" | "-t" => {
                let raw = value(&mut iter, &arg)?;
                let cents = raw
                    .parse()
                    .map_err(|_| format!("Invalid amount for {}: {}", arg, raw))?;
                args.tender = Some(cents);
            }
            "--pending" => args.pending = true,
            "--refund" => {
                args.refund = Some(value(&mut iter, &arg)?);
            }
            "--help" | "-h" => {
                println!("DesPOS Register");
                println!();
                println!("Usage: despos-register [OPTIONS] <PRODUCT_ID[:QTY]>...");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>          Database file path");
                println!("  -c, --customer <ID>      Customer contact id");
                println!("  -t, --tender <CENTS>     Cash handed over (default: total due)");
                println!("      --pending            Save as pending instead of finishing");
                println!("      --refund <SALE_ID>   Refund a stored paid sale");
                println!("  -h, --help               Show this help message");
                return Ok(None);
            }
            line => args.lines.push(parse_line(line)?),
        }
    }

    Ok(Some(args))
}

fn value(iter: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, String> {
    iter.next().ok_or_else(|| format!("{} needs a value", flag))
}

fn parse_line(raw: &str) -> Result<(String, i64), String> {
    match raw.split_once(':') {
        Some((id, qty)) => {
            let qty = qty
                .parse()
                .map_err(|_| format!("Invalid quantity in {}", raw))?;
            Ok((id.to_string(), qty))
        }
        None => Ok((raw.to_string(), 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_lines_and_flags() {
        let args = parse_args(strings(&["--customer", "c-1", "p-1:3", "p-2", "-t", "5000"]))
            .unwrap()
            .unwrap();

        assert_eq!(args.customer.as_deref(), Some("c-1"));
        assert_eq!(args.tender, Some(5000));
        assert_eq!(
            args.lines,
            vec![("p-1".to_string(), 3), ("p-2".to_string(), 1)]
        );
    }

    #[test]
    fn test_missing_flag_value() {
        assert!(parse_args(strings(&["--db"])).is_err());
    }

    #[test]
    fn test_bad_quantity() {
        assert!(parse_args(strings(&["p-1:many"])).is_err());
    }
}

//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `storefront_core` linkage.
//! - Drive the lifecycle coordinator against a real database file.

use clap::{Parser, Subcommand};
use log::info;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use storefront_core::{
    init_logging_from_config, open_db, Amount, CoreConfig, NewOrder, NewProfile, NewUser,
    OrderManagementService, UserId,
};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "storefront")]
#[command(about = "Storefront core smoke CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// SQLite database file, overriding STOREFRONT_DB_PATH
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print core ping and version
    Ping,
    /// Create a demo user with a profile and two orders
    Create {
        /// Username; a unique demo name is generated when omitted
        #[arg(long)]
        username: Option<String>,
    },
    /// List the newest orders
    List {
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Show order statistics for a user (defaults to the newest order's owner)
    Stats { user_id: Option<UserId> },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let command = cli.command.unwrap_or(Command::Ping);
    if let Command::Ping = command {
        println!("storefront_core ping={}", storefront_core::ping());
        println!("storefront_core version={}", storefront_core::core_version());
        return Ok(());
    }

    let mut config = CoreConfig::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    init_logging_from_config(&config)?;

    let mut conn = open_db(&config.db_path)?;
    let mut service = OrderManagementService::try_new(&mut conn)?
        .with_recent_orders_limit(config.recent_orders_limit);

    match command {
        Command::Ping => {}
        Command::Create { username } => create_demo(&mut service, username)?,
        Command::List { limit } => {
            for summary in service.find_recent_orders(limit)? {
                println!(
                    "{}\t{}\t{}\t{}",
                    summary.order.order_number,
                    summary.username,
                    summary.order.total_amount,
                    summary.order.status
                );
            }
        }
        Command::Stats { user_id } => {
            let user_id = match user_id {
                Some(id) => Some(id),
                None => service
                    .find_recent_orders(Some(1))?
                    .first()
                    .and_then(|summary| summary.order.user_id()),
            };
            let Some(user_id) = user_id else {
                println!("no orders yet");
                return Ok(());
            };
            let stats = service.order_stats(user_id)?;
            println!(
                "user={user_id} orders={} total={} average={}",
                stats.order_count, stats.total_amount, stats.average_amount
            );
        }
    }
    Ok(())
}

fn create_demo(
    service: &mut OrderManagementService<'_>,
    username: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let tag = Uuid::new_v4().simple().to_string();
    let tag = &tag[..8];
    let username = username.unwrap_or_else(|| format!("demo_{tag}"));

    let user = service.create_user_with_profile(
        &NewUser {
            email: format!("{username}@example.com"),
            username,
        },
        &NewProfile {
            first_name: "Alice".to_string(),
            last_name: "Johnson".to_string(),
            ..NewProfile::default()
        },
    )?;
    let user_id = user.id().ok_or("created user has no id")?;
    info!("event=cli_create module=cli status=ok user_id={user_id}");

    for (index, amount) in ["99.99", "149.50"].into_iter().enumerate() {
        let order = service.create_order(
            user_id,
            &NewOrder {
                order_number: format!("ORD-{tag}-{}", index + 1),
                total_amount: Amount::parse(amount)?,
            },
        )?;
        println!(
            "order id={} number={} total={}",
            order.id().unwrap_or_default(),
            order.order_number,
            order.total_amount
        );
    }

    println!(
        "user id={user_id} username={} orders={} total={}",
        user.username,
        service.count_orders_by_user(user_id)?,
        service.total_amount_by_user(user_id)?
    );
    Ok(())
}

mod cli;

use recordstore::demo;
use recordstore_common::StoreConfig;
use recordstore_db::{models, Db, Store};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

const DEFAULT_CONFIG: &str = "recordstore.toml";

fn load_config(path: Option<&Path>) -> Result<StoreConfig> {
    let config = match path {
        Some(p) => StoreConfig::load(p)?,
        None => StoreConfig::load_or_default(Some(Path::new(DEFAULT_CONFIG)))?,
    };
    Ok(config)
}

fn open_store(config: &StoreConfig) -> Result<Store> {
    let store = Store::open(config)
        .with_context(|| format!("failed to open {}", config.database.path.display()))?;
    store.migrate(models::ALL_SCHEMAS)?;
    Ok(store)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("recordstore {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }
    if let Commands::Validate { config } = &cli.command {
        let path = config.clone().or_else(|| cli.config.clone());
        return validate_config(path.as_deref());
    }

    let config = load_config(cli.config.as_deref())?;

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "recordstore=debug,recordstore_db=debug,recordstore_common=debug,recordstore::sql=debug"
                .to_string()
        } else {
            let level = &config.logging.level;
            let mut filter =
                format!("recordstore={level},recordstore_db={level},recordstore_common={level}");
            if config.logging.log_sql {
                filter.push_str(",recordstore::sql=debug");
            }
            filter
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Migrate => {
            let store = open_store(&config)?;
            println!("Schema is up to date ({} tables)", models::ALL_SCHEMAS.len());
            store.close();
            Ok(())
        }
        Commands::Seed { users } => seed(&config, users),
        Commands::Stats { json } => print_stats(&config, json),
        Commands::Users { limit, min_balance } => list_users(&config, limit, min_balance),
        Commands::Validate { .. } | Commands::Version => Ok(()),
    }
}

fn seed(config: &StoreConfig, users: usize) -> Result<()> {
    let store = open_store(config)?;
    let report = demo::seed(&store, users)?;
    if report.skipped {
        println!("Database already has users; nothing seeded");
    } else {
        println!(
            "Seeded {} users, {} wallets, {} addresses, {} products, {} likes, {} todos",
            report.users, report.wallets, report.addresses, report.products, report.likes, report.todos
        );
    }
    store.close();
    Ok(())
}

fn print_stats(config: &StoreConfig, json: bool) -> Result<()> {
    let store = open_store(config)?;
    let stats = demo::stats(&store)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Users:     {}", stats.users);
        println!("Wallets:   {}", stats.wallets);
        println!("Addresses: {}", stats.addresses);
        println!("Products:  {}", stats.products);
        println!("Likes:     {}", stats.likes);
        println!("Todos:     {} ({} deleted)", stats.todos, stats.deleted_todos);
        println!(
            "Balance:   total {}, min {}, max {}, avg {:.2}",
            stats.balance.total, stats.balance.min, stats.balance.max, stats.balance.average
        );
    }
    store.close();
    Ok(())
}

fn list_users(config: &StoreConfig, limit: i64, min_balance: Option<i64>) -> Result<()> {
    let store = open_store(config)?;
    let users = demo::list_users(&store, limit, min_balance)?;
    if users.is_empty() {
        println!("No users");
    }
    for user in &users {
        let balance = user
            .wallet
            .as_ref()
            .map_or_else(|| "-".to_string(), |w| w.balance.to_string());
        println!(
            "{:<8} {:<20} balance {:<10} addresses {} likes {}",
            user.id.as_str(),
            format!("{} {}", user.name.first_name, user.name.last_name),
            balance,
            user.addresses.len(),
            user.liked_products.len()
        );
    }
    store.close();
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            StoreConfig::load(p)?
        }
        None => {
            println!("No config file specified, using defaults");
            StoreConfig::default()
        }
    };

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("✓ Configuration is valid");
    } else {
        println!("Configuration has {} warning(s):", warnings.len());
        for warning in &warnings {
            println!("  - {warning}");
        }
    }
    println!("  Database: {}", config.database.path.display());
    println!("  Journal mode: {}", config.database.journal_mode);
    println!(
        "  Pool: max_open {}, max_idle {}",
        config.pool.max_open, config.pool.max_idle
    );
    Ok(())
}

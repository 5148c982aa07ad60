use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use storefront::config::Config;
use storefront::db::{AppState, DbPool, create_pool, queries};
use storefront::lifecycle::deadline;
use storefront::models::{CreateUser, UserRole};
use storefront::notify::{NotificationService, Notifier};
use storefront::storage::FileStorage;

#[derive(Parser)]
#[command(name = "storefront", version, about = "License storefront server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create a user and print its API key
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        /// customer or admin
        #[arg(long, default_value = "customer")]
        role: String,
    },
    /// Cancel unpaid orders past their payment deadline, then exit
    Sweep,
}

fn notifier_from(config: &Config) -> Arc<dyn Notifier> {
    Arc::new(NotificationService::new(
        config.notify_webhook_url.clone(),
        config.notify_webhook_secret.clone(),
    ))
}

/// Create the first admin on an empty install so the admin API is reachable.
fn bootstrap_admin(pool: &DbPool, email: &str) -> anyhow::Result<()> {
    let conn = pool.get()?;
    if queries::get_user_by_email(&conn, email)?.is_some() {
        return Ok(());
    }
    let (user, api_key) = queries::create_user(
        &conn,
        &CreateUser {
            email: email.to_string(),
            name: "Administrator".to_string(),
            role: UserRole::Admin,
        },
    )?;
    tracing::info!(user_id = %user.id, email = %user.email, "Bootstrap admin created");
    println!();
    println!("Bootstrap admin API key (shown once): {}", api_key);
    println!();
    Ok(())
}

fn spawn_deadline_sweep(pool: DbPool, notifier: Arc<dyn Notifier>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let pool = pool.clone();
            let notifier = notifier.clone();
            let result = tokio::task::spawn_blocking(move || -> storefront::error::Result<Vec<String>> {
                let mut conn = pool.get()?;
                deadline::sweep_lapsed_orders(&mut conn, queries::now(), notifier.as_ref())
            })
            .await;
            match result {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Deadline sweep failed"),
                Err(e) => tracing::error!(error = %e, "Deadline sweep task panicked"),
            }
        }
    });
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = create_pool(&config.database_path).context("opening database")?;

    if let Some(email) = &config.bootstrap_admin_email {
        bootstrap_admin(&pool, email)?;
    }

    let notifier = notifier_from(&config);
    if config.deadline_sweep_secs > 0 {
        spawn_deadline_sweep(
            pool.clone(),
            notifier.clone(),
            Duration::from_secs(config.deadline_sweep_secs),
        );
    }

    let state = AppState {
        db: pool,
        settings: config.checkout_settings(),
        notifier,
        storage: FileStorage::new(&config.storage_dir),
    };

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    tracing::info!(
        addr = %addr,
        tax_basis_points = config.tax_basis_points,
        "Storefront listening"
    );
    axum::serve(listener, storefront::app(state)).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::CreateUser { email, name, role } => {
            let role = UserRole::from_str(&role)
                .map_err(|_| anyhow::anyhow!("role must be 'customer' or 'admin'"))?;
            let pool = create_pool(&config.database_path)?;
            let conn = pool.get()?;
            let (user, api_key) = queries::create_user(&conn, &CreateUser { email, name, role })?;
            println!("Created {} {} ({})", role.as_ref(), user.email, user.id);
            println!("API key (shown once): {}", api_key);
            Ok(())
        }
        Command::Sweep => {
            let pool = create_pool(&config.database_path)?;
            let mut conn = pool.get()?;
            let cancelled =
                deadline::sweep_lapsed_orders(&mut conn, queries::now(), notifier_from(&config).as_ref())?;
            println!("Cancelled {} lapsed order(s)", cancelled.len());
            for order_number in cancelled {
                println!("  {}", order_number);
            }
            Ok(())
        }
    }
}

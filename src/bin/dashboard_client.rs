//! Terminal client for the banking dashboard.
//!
//! ```text
//! dashboard_client register <name> <email> <access-code>
//! dashboard_client login <email> <access-code>
//! dashboard_client watch
//! dashboard_client rename <account-id> <new name...>
//! dashboard_client block <card-id>
//! dashboard_client pin <card-id> <access-code>
//! dashboard_client logout
//! ```

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use banking_dashboard::domain::{IbanMode, User};
use banking_dashboard::infrastructure::identity::FileIdentityStore;
use banking_dashboard::infrastructure::shutdown::cancel_on_ctrl_c;
use banking_dashboard::infrastructure::{init_logging, ClientConfig, LoggingConfig};
use banking_dashboard::sync::{ApprovalEvent, Notification};
use banking_dashboard::application::dto::RegisterRequest;
use banking_dashboard::{
    ApprovalWatcher, BankingApi, DashboardSession, GateDecision, HttpBankingApi, SessionContext,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ClientConfig::from_env();
    let _guards = init_logging(LoggingConfig::default().with_level(&config.log_level))?;

    let api: Arc<dyn BankingApi> =
        Arc::new(HttpBankingApi::new(config.api_url.clone(), config.request_timeout)?);
    let session = SessionContext::new(Arc::new(FileIdentityStore::new(&config.session_file)));

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("watch");

    match (command, &args[1.min(args.len())..]) {
        ("register", [name, email, access_code]) => {
            let user = api
                .register(&RegisterRequest {
                    name: name.clone(),
                    email: email.clone(),
                    access_code: access_code.clone(),
                    role: None,
                })
                .await?;
            session.store(&user).await?;
            println!(
                "Registered {} ({}). Waiting for an advisor to approve the account.",
                user.name, user.id
            );
        }
        ("login", [email, access_code]) => {
            let user = api.login(email, access_code).await?;
            session.store(&user).await?;
            print_user(&user);
        }
        ("watch", []) => watch(api, session, &config).await?,
        ("rename", [account_id, name @ ..]) if !name.is_empty() => {
            let (dashboard, notifications) = open_dashboard(api, session, &config).await?;
            // Errors are reported through the notification below.
            let _ = dashboard.rename_account(account_id, &name.join(" ")).await;
            drain(notifications);
        }
        ("block", [card_id]) => {
            let (dashboard, notifications) = open_dashboard(api, session, &config).await?;
            let _ = dashboard.block_card(card_id).await;
            drain(notifications);
        }
        ("pin", [card_id, access_code]) => {
            let (dashboard, notifications) = open_dashboard(api, session, &config).await?;
            if let Ok(pin) = dashboard.reveal_pin(card_id, access_code).await {
                println!("PIN: {}", pin);
            }
            drain(notifications);
        }
        ("logout", []) => {
            session.clear().await?;
            println!("Logged out.");
        }
        _ => bail!("unknown command; see the module docs for usage"),
    }
    Ok(())
}

async fn open_dashboard(
    api: Arc<dyn BankingApi>,
    session: SessionContext,
    config: &ClientConfig,
) -> Result<(DashboardSession, mpsc::Receiver<Notification>)> {
    let token = CancellationToken::new();
    DashboardSession::start(api, session, &config.sync, &token)
        .await
        .context("could not open the dashboard")
}

/// Gate on approval, then keep the dashboard in sync until Ctrl-C.
async fn watch(
    api: Arc<dyn BankingApi>,
    session: SessionContext,
    config: &ClientConfig,
) -> Result<()> {
    let shutdown = CancellationToken::new();
    cancel_on_ctrl_c(shutdown.clone());

    let watcher = ApprovalWatcher::new(api.clone(), &config.sync, shutdown.child_token());
    match watcher.enter(&session).await? {
        GateDecision::Unauthenticated => {
            println!("No session. Run `dashboard_client login <email> <access-code>` first.");
            return Ok(());
        }
        GateDecision::Dashboard(_) => {}
        GateDecision::AwaitApproval(mut handle) => {
            println!("Your account is awaiting advisor approval...");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => return Ok(()),
                    event = handle.next_event() => match event {
                        Some(ApprovalEvent::Approved(user)) => {
                            println!("Your account has been approved, welcome {}!", user.name);
                            break;
                        }
                        Some(ApprovalEvent::PollFailed(e)) => info!("Approval check failed: {}", e),
                        None => return Ok(()),
                    }
                }
            }
        }
    }

    let (dashboard, mut notifications) =
        DashboardSession::start(api, session, &config.sync, &shutdown).await?;
    print_dashboard(&dashboard).await;

    let mut ticker = tokio::time::interval(config.sync.poll_interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => print_dashboard(&dashboard).await,
            Some(notification) = notifications.recv() => print_notification(&notification),
        }
    }
    Ok(())
}

fn print_user(user: &User) {
    let status = if user.is_approved { "approved" } else { "pending approval" };
    println!("{} <{}> [{}] {}", user.name, user.email, user.role, status);
}

async fn print_dashboard(dashboard: &DashboardSession) {
    println!();
    print_user(dashboard.user());
    println!("Accounts:");
    for account in dashboard.accounts().await {
        let iban = dashboard
            .iban(&account.id, IbanMode::Cosmetic)
            .await
            .map(|resolved| resolved.iban)
            .unwrap_or_default();
        println!("  {:<12} {:<24} {:>12} EUR  {}", account.id, account.name, account.balance, iban);
    }
    println!("Cards:");
    for card in dashboard.cards().await {
        let status = if card.is_blocked { "BLOCKED" } else { "active" };
        println!(
            "  {:<12} {}  exp {}  {}",
            card.id,
            card.masked_number(),
            card.expiry_date,
            status
        );
    }
}

fn print_notification(notification: &Notification) {
    match notification {
        Notification::Success(message) => println!("[ok] {}", message),
        Notification::Error(message) => println!("[error] {}", message),
    }
}

fn drain(mut notifications: mpsc::Receiver<Notification>) {
    while let Ok(notification) = notifications.try_recv() {
        print_notification(&notification);
    }
}

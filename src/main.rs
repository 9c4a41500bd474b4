use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use portal::api::users::{self, UserForm};
use portal::config::PortalConfig;
use portal::error::{ConfigError, ErrorCode};
use portal::model::token_preview;
use portal::nav::{self, NAV_ITEMS, Role};
use portal::session::{RevalidationTrigger, spawn_revalidation_task, spawn_storage_sync_task};
use portal::storage::{FileStore, KeyValueStore, SessionStore};
use portal::{PortalError, SessionManager};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const FILE_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
enum CliError {
    /// Missing or malformed `PORTAL_*` settings.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Any failure from the portal library, printed with its error code.
    #[error("{0}")]
    Portal(#[from] PortalError),
    /// The command needs a stored session and there is none.
    #[error("not logged in; run `portal login` first")]
    NotLoggedIn,
    /// The backend answered 401; the local session was dropped.
    #[error("session expired; log in again")]
    SessionExpired,
    #[error("user not found: {0}")]
    UserNotFound(String),
    /// Output could not be rendered as JSON.
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// Ctrl-C or user-signal handlers could not be installed.
    #[error("signal handler failed: {0}")]
    Signal(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "portal", about = "Admin portal session and users CLI")]
struct Cli {
    #[arg(long, env = "PORTAL_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "PORTAL_STORE_PATH")]
    store_path: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    /// Print the stored session.
    Whoami,
    /// Check the stored token with the backend now.
    Revalidate,
    /// Print navigation items visible to the current user.
    Nav,
    Users(UsersCommand),
    /// Keep the session current until it ends or Ctrl-C. Each line on stdin
    /// requests an immediate revalidation; SIGUSR1 and SIGUSR2 stand in for
    /// window focus and visibility changes.
    Watch,
}

#[derive(Args, Debug)]
struct UsersCommand {
    #[command(subcommand)]
    command: UsersSubcommand,
}

#[derive(Subcommand, Debug)]
enum UsersSubcommand {
    List,
    Get {
        username: String,
    },
    Create {
        username: String,
        #[arg(long)]
        name: String,
        #[arg(long, value_parser = parse_role)]
        role: Role,
        #[arg(long)]
        password: String,
        #[arg(long, default_value_t = false)]
        inactive: bool,
        #[arg(long)]
        usability: Option<String>,
    },
    Update {
        username: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_parser = parse_role)]
        role: Option<Role>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        active: Option<bool>,
        #[arg(long)]
        usability: Option<String>,
    },
    /// Soft-delete a user. Super only.
    Delete {
        username: String,
    },
    /// Flip a user's active status.
    Toggle {
        username: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    if let Err(error) = run(Cli::parse()).await {
        eprintln!("error: {error}");
        if let CliError::Portal(portal) = &error {
            eprintln!("code: {}", portal.error_code());
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = PortalConfig::from_lookup(|key| match key {
        "PORTAL_BASE_URL" => cli.base_url.clone(),
        "PORTAL_STORE_PATH" => cli.store_path.clone(),
        _ => std::env::var(key).ok(),
    })?;

    let file = Arc::new(FileStore::open(config.store_path.clone()));
    let kv: Arc<dyn KeyValueStore> = file.clone();
    let api = portal::api::ApiClient::new(&config, SessionStore::new(kv))?;
    let manager = SessionManager::new(api, config.debounce);

    match cli.command {
        Command::Login { username, password } => {
            let user = manager.login(&username, &password).await?;
            print_json(&json!({ "loggedIn": true, "user": user }))
        }
        Command::Logout => {
            manager.logout().await;
            println!("logged out");
            Ok(())
        }
        Command::Whoami => run_whoami(&manager),
        Command::Revalidate => {
            let outcome = manager.revalidate(RevalidationTrigger::Manual).await;
            print_json(&json!({ "outcome": format!("{outcome:?}"), "authenticated": manager.is_authenticated() }))
        }
        Command::Nav => {
            let user = manager.user();
            let items = nav::visible_items(NAV_ITEMS, user.as_ref());
            print_json(&serde_json::to_value(items)?)
        }
        Command::Users(users) => run_users(&manager, users).await,
        Command::Watch => run_watch(&manager, file, &config).await,
    }
}

fn run_whoami(manager: &SessionManager) -> Result<(), CliError> {
    let session = manager.session();
    let (Some(token), Some(user)) = (session.token(), session.user()) else {
        return Err(CliError::NotLoggedIn);
    };
    print_json(&json!({ "token": token_preview(token), "user": user }))
}

// =============================================================================
// USERS
// =============================================================================

async fn run_users(manager: &SessionManager, users: UsersCommand) -> Result<(), CliError> {
    if !manager.is_authenticated() {
        return Err(CliError::NotLoggedIn);
    }
    nav::require_users_view(manager.user().as_ref())?;

    let result = users_action(manager, users.command).await;
    if let Err(CliError::Portal(PortalError::Unauthorized)) = &result {
        manager.expire("unauthorized");
        return Err(CliError::SessionExpired);
    }
    result
}

async fn users_action(manager: &SessionManager, command: UsersSubcommand) -> Result<(), CliError> {
    let api = manager.api();
    match command {
        UsersSubcommand::List => {
            let list = users::list_users(api).await?;
            print_json(&serde_json::to_value(list)?)
        }
        UsersSubcommand::Get { username } => {
            let user = fetch_user(manager, &username).await?;
            print_json(&serde_json::to_value(user)?)
        }
        UsersSubcommand::Create { username, name, role, password, inactive, usability } => {
            let form = UserForm {
                username,
                password,
                name,
                role: role.as_str().to_owned(),
                status: !inactive,
                usability,
            };
            let response = users::create_user(api, &form).await.inspect_err(save_failed)?;
            info!(username = %form.username, "user created");
            print_json(&response)
        }
        UsersSubcommand::Update { username, name, role, password, active, usability } => {
            let current = fetch_user(manager, &username).await?;
            let mut form = UserForm::from_record(&current);
            if let Some(name) = name {
                form.name = name;
            }
            if let Some(role) = role {
                form.role = role.as_str().to_owned();
            }
            if let Some(password) = password {
                form.password = password;
            }
            if let Some(active) = active {
                form.status = active;
            }
            if usability.is_some() {
                form.usability = usability;
            }
            let response = users::update_user(api, &form).await.inspect_err(save_failed)?;
            info!(username = %form.username, "user updated");
            print_json(&response)
        }
        UsersSubcommand::Delete { username } => {
            nav::require_user_delete(manager.user().as_ref())?;
            let response = users::soft_delete_user(api, &username)
                .await
                .inspect_err(|error| warn!(%username, %error, "delete failed"))?;
            print_json(&response)
        }
        UsersSubcommand::Toggle { username } => {
            let current = fetch_user(manager, &username).await?;
            let response = users::toggle_status(api, &current).await.inspect_err(save_failed)?;
            info!(%username, active = !current.status, "user status toggled");
            print_json(&response)
        }
    }
}

async fn fetch_user(manager: &SessionManager, username: &str) -> Result<portal::UserRecord, CliError> {
    users::get_user(manager.api(), username)
        .await?
        .ok_or_else(|| CliError::UserNotFound(username.to_owned()))
}

fn save_failed(error: &PortalError) {
    warn!(%error, "save failed");
}

fn parse_role(raw: &str) -> Result<Role, String> {
    Role::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = Role::ALL.iter().map(|r| r.as_str()).collect();
        format!("unknown role `{raw}`; expected one of {}", known.join(", "))
    })
}

// =============================================================================
// WATCH
// =============================================================================

async fn run_watch(manager: &SessionManager, file: Arc<FileStore>, config: &PortalConfig) -> Result<(), CliError> {
    if !manager.is_authenticated() {
        return Err(CliError::NotLoggedIn);
    }

    let (triggers, trigger_rx) = mpsc::channel(8);
    let mut tasks = vec![
        spawn_revalidation_task(manager.clone(), trigger_rx, config.revalidate_every),
        spawn_storage_sync_task(manager.clone(), manager.api().store().subscribe()),
        spawn_file_poll_task(file, FILE_POLL_INTERVAL),
        spawn_stdin_trigger_task(triggers.clone()),
    ];
    #[cfg(unix)]
    tasks.push(portal::session::spawn_signal_trigger_task(triggers.clone())?);
    info!(
        every_secs = config.revalidate_every.as_secs(),
        path = %config.store_path.display(),
        "watching session"
    );

    let mut state = manager.subscribe();
    let result = tokio::select! {
        signal = tokio::signal::ctrl_c() => signal.map_err(CliError::from),
        _ = state.wait_for(|snap| !snap.session.is_authenticated()) => {
            eprintln!("session ended; log in again");
            Ok(())
        }
    };

    drop(triggers);
    for task in tasks {
        task.abort();
    }
    result
}

fn spawn_file_poll_task(file: Arc<FileStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            file.poll_external_changes();
        }
    })
}

fn spawn_stdin_trigger_task(triggers: mpsc::Sender<RevalidationTrigger>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(_)) = lines.next_line().await {
            if triggers.send(RevalidationTrigger::Manual).await.is_err() {
                break;
            }
        }
    })
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

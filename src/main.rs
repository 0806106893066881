use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use portica::api::{ApiClient, EnvironmentId};
use portica::config::Config;
use portica::notification::{Notification, NotificationManager};
use portica::query::{ErrorMeta, QueryClient, QueryObserver};
use portica::resource::kubernetes::ApplicationRef;
use portica::resource::nomad::{JobRef, NomadDashboard};
use portica::resource::stacks::StackImageStatus;
use portica::resource::{docker, environments, kubernetes, nomad, stacks, Outcome};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Command line client for container-management APIs
#[derive(Parser, Debug)]
#[command(name = "portica", version = portica::VERSION, about, long_about = None)]
struct Args {
    /// Base URL of the API (overrides PORTICA_URL and the config file)
    #[arg(long, global = true)]
    url: Option<String>,

    /// API key (overrides PORTICA_API_KEY and the config file)
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List environments
    Environments,
    /// Show the dashboard of an environment
    Dashboard {
        #[arg(long)]
        env: u64,
        #[arg(long, value_enum, default_value = "docker")]
        platform: Platform,
    },
    /// List stacks
    Stacks,
    /// Show whether the images of a stack are up to date
    ImageStatus {
        #[arg(long)]
        stack: u64,
    },
    /// List Nomad jobs
    Jobs {
        #[arg(long)]
        env: u64,
    },
    /// Delete a Nomad job
    DeleteJob {
        #[arg(long)]
        env: u64,
        #[arg(long)]
        job: String,
        #[arg(long, default_value = "default")]
        namespace: String,
    },
    /// List Kubernetes namespaces
    Namespaces {
        #[arg(long)]
        env: u64,
    },
    /// Rollout-restart a Kubernetes application
    Restart {
        #[arg(long)]
        env: u64,
        #[arg(long)]
        namespace: String,
        /// Workload kind, e.g. deployment
        #[arg(long)]
        kind: String,
        #[arg(long)]
        name: String,
    },
    /// List Docker volumes
    Volumes {
        #[arg(long)]
        env: u64,
    },
    /// Remove a Docker volume
    RemoveVolume {
        #[arg(long)]
        env: u64,
        #[arg(long)]
        name: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Platform {
    Docker,
    Nomad,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", log_path.display(), e);
            return None;
        },
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("portica started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("portica").join("portica.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".portica").join("portica.log");
    }
    PathBuf::from("portica.log")
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let config = Config::load().with_overrides(args.url.clone(), args.api_key.clone());
    let client = ApiClient::from_config(&config)?;

    let notifications = Arc::new(NotificationManager::from_config(&config.notifications));
    let queries = QueryClient::new(notifications.clone(), config.query_options());

    let succeeded = run(args.command, &queries, &client, &notifications).await?;

    if let Some(toast) = notifications.current_toast_message() {
        eprintln!("{}", toast);
    }

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Run one command; failures are reported through the notification manager
async fn run(
    command: Command,
    queries: &QueryClient,
    client: &ApiClient,
    notifications: &NotificationManager,
) -> Result<bool> {
    match command {
        Command::Environments => print_query(environments::use_environments(queries, client)).await,
        Command::Dashboard { env, platform } => {
            let env = EnvironmentId::new(env);
            match platform {
                Platform::Docker => print_query(docker::use_dashboard(queries, client, env)).await,
                Platform::Nomad => print_query(nomad::use_dashboard::<NomadDashboard>(queries, client, env)).await,
            }
        },
        Command::Stacks => print_query(stacks::use_stacks(queries, client)).await,
        Command::ImageStatus { stack } => {
            let mut observer = stacks::use_stack_image_status(queries, client, stack);
            let state = observer.settled().await;
            match state.data() {
                Some(Outcome::Degraded { value, cause }) => {
                    notifications.push(Notification::from_error(
                        &ErrorMeta::new("Warning", "Image status unavailable"),
                        cause,
                    ));
                    print_json(value)
                },
                Some(outcome) => match outcome.value() {
                    Some(value) => print_json::<StackImageStatus>(value),
                    None => Ok(false),
                },
                None => Ok(false),
            }
        },
        Command::Jobs { env } => print_query(nomad::use_jobs(queries, client, EnvironmentId::new(env))).await,
        Command::DeleteJob { env, job, namespace } => {
            let mut mutation = nomad::use_delete_job(queries, client, EnvironmentId::new(env));
            let message = format!("Job {} deleted", job);
            Ok(mutation
                .mutate(JobRef { id: job, namespace })
                .await
                .map(|()| notifications.success("Success", message))
                .is_ok())
        },
        Command::Namespaces { env } => {
            print_query(kubernetes::use_namespaces(queries, client, EnvironmentId::new(env))).await
        },
        Command::Restart {
            env,
            namespace,
            kind,
            name,
        } => {
            let mut mutation = kubernetes::use_restart_application(queries, client, EnvironmentId::new(env));
            let message = format!("Application {}/{} restarted", kind, name);
            Ok(mutation
                .mutate(ApplicationRef::new(namespace, kind, name))
                .await
                .map(|()| notifications.success("Success", message))
                .is_ok())
        },
        Command::Volumes { env } => print_query(docker::use_volumes(queries, client, EnvironmentId::new(env))).await,
        Command::RemoveVolume { env, name } => {
            let mut mutation = docker::use_remove_volume(queries, client, EnvironmentId::new(env));
            let message = format!("Volume {} removed", name);
            Ok(mutation
                .mutate(name)
                .await
                .map(|()| notifications.success("Success", message))
                .is_ok())
        },
    }
}

/// Wait for a query to settle and print its data
async fn print_query<T>(mut observer: QueryObserver<T>) -> Result<bool>
where
    T: Serialize + Send + Sync + 'static,
{
    let state = observer.settled().await;
    match state.data() {
        Some(data) if state.error().is_none() => print_json(data),
        _ => Ok(false),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<bool> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(true)
}

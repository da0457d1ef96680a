use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use log::debug;
use serde_json::json;

use tether_state::{
    BackendConfig, DEFAULT_STATE_NAME, RemoteClient, StateBackend, StatePayload, create_backend,
    write_locked,
};

/// Lock operation label used by `push`
const PUSH_OPERATION: &str = "push";

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Manage infrastructure state stored on an HTTP endpoint", long_about = None)]
struct Cli {
    #[command(flatten)]
    backend: BackendArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Backend settings; flags override values from the config file
#[derive(Args, Default)]
struct BackendArgs {
    /// JSON file with backend attributes
    #[arg(long, global = true, env = "TETHER_CONFIG")]
    config: Option<PathBuf>,

    /// Base address of the state endpoint
    #[arg(long, global = true, env = "TETHER_ADDRESS")]
    address: Option<String>,

    /// HTTP method used to write state
    #[arg(long, global = true, env = "TETHER_UPDATE_METHOD")]
    update_method: Option<String>,

    /// Base address of lock requests
    #[arg(long, global = true, env = "TETHER_LOCK_ADDRESS")]
    lock_address: Option<String>,

    /// HTTP method used to lock
    #[arg(long, global = true, env = "TETHER_LOCK_METHOD")]
    lock_method: Option<String>,

    /// Base address of unlock requests
    #[arg(long, global = true, env = "TETHER_UNLOCK_ADDRESS")]
    unlock_address: Option<String>,

    /// HTTP method used to unlock
    #[arg(long, global = true, env = "TETHER_UNLOCK_METHOD")]
    unlock_method: Option<String>,

    /// Username for HTTP basic authentication
    #[arg(long, global = true, env = "TETHER_USERNAME")]
    username: Option<String>,

    /// Password for HTTP basic authentication
    #[arg(long, global = true, env = "TETHER_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Skip TLS certificate verification (https only)
    #[arg(long, global = true)]
    skip_cert_verification: bool,

    /// Request timeout in seconds
    #[arg(long, global = true, env = "TETHER_TIMEOUT")]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Named state management commands
    States {
        #[command(subcommand)]
        command: StatesCommands,
    },
    /// Print a state document, creating an empty one if none exists
    Pull {
        /// State name
        #[arg(default_value = DEFAULT_STATE_NAME)]
        name: String,

        /// Write the document to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Upload a state document while holding the state's lock
    Push {
        /// File holding the document
        file: PathBuf,

        /// State name
        #[arg(long, short, default_value = DEFAULT_STATE_NAME)]
        name: String,
    },
    /// Release a lock left behind by another process
    ForceUnlock {
        /// State name
        name: String,

        /// Lock ID reported by the failed operation
        lock_id: String,

        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum StatesCommands {
    /// List named states
    List,
    /// Delete a named state
    Delete {
        /// State name
        name: String,

        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::States { command } => run_states_command(&cli.backend, command).await,
        Commands::Pull { name, output } => run_pull(&cli.backend, &name, output.as_deref()).await,
        Commands::Push { file, name } => run_push(&cli.backend, &file, &name).await,
        Commands::ForceUnlock {
            name,
            lock_id,
            force,
        } => run_force_unlock(&cli.backend, &name, &lock_id, force).await,
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "tether", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Merge the config file (if any) with command line overrides
fn load_backend_config(args: &BackendArgs) -> Result<BackendConfig, String> {
    let mut config = match &args.config {
        Some(path) => {
            let content = fs::read_to_string(path)
                .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
            BackendConfig::from_json("http", &content).map_err(|e| e.to_string())?
        }
        None => BackendConfig::new("http"),
    };

    let overrides = [
        ("address", &args.address),
        ("update_method", &args.update_method),
        ("lock_address", &args.lock_address),
        ("lock_method", &args.lock_method),
        ("unlock_address", &args.unlock_address),
        ("unlock_method", &args.unlock_method),
        ("username", &args.username),
        ("password", &args.password),
    ];
    for (key, value) in overrides {
        if let Some(value) = value {
            config = config.with_attribute(key, json!(value));
        }
    }
    if args.skip_cert_verification {
        config = config.with_attribute("skip_cert_verification", json!(true));
    }
    if let Some(timeout) = args.timeout {
        config = config.with_attribute("timeout_seconds", json!(timeout));
    }

    Ok(config)
}

fn open_backend(args: &BackendArgs) -> Result<Box<dyn StateBackend>, String> {
    let config = load_backend_config(args)?;
    debug!(
        "opening {} backend at {}",
        config.backend_type,
        config.get_string("address").unwrap_or("<unset>")
    );
    create_backend(&config).map_err(|e| e.to_string())
}

/// Ask for a literal "yes"
fn confirm(question: &str, detail: &str) -> Result<bool, String> {
    println!("{}", question.yellow().bold());
    println!("  {}", detail.yellow());
    print!("\n  Enter a value: ");
    std::io::stdout().flush().map_err(|e| e.to_string())?;

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| e.to_string())?;
    println!();

    Ok(input.trim() == "yes")
}

async fn run_states_command(args: &BackendArgs, command: StatesCommands) -> Result<(), String> {
    match command {
        StatesCommands::List => run_states_list(args).await,
        StatesCommands::Delete { name, auto_approve } => {
            run_states_delete(args, &name, auto_approve).await
        }
    }
}

async fn run_states_list(args: &BackendArgs) -> Result<(), String> {
    let backend = open_backend(args)?;
    let names = backend.list_states().await.map_err(|e| e.to_string())?;

    for name in names {
        if name == DEFAULT_STATE_NAME {
            println!("  {}", name.bold());
        } else {
            println!("  {}", name);
        }
    }
    Ok(())
}

async fn run_states_delete(
    args: &BackendArgs,
    name: &str,
    auto_approve: bool,
) -> Result<(), String> {
    let backend = open_backend(args)?;

    if !auto_approve {
        let question = format!("Do you really want to delete state \"{}\"?", name);
        if !confirm(&question, "This action cannot be undone. Type 'yes' to confirm.")? {
            println!("{}", "Delete cancelled.".yellow());
            return Ok(());
        }
    }

    backend
        .delete_state(name)
        .await
        .map_err(|e| e.to_string())?;
    println!("{}", format!("✓ Deleted state \"{}\".", name).green().bold());
    Ok(())
}

async fn run_pull(args: &BackendArgs, name: &str, output: Option<&Path>) -> Result<(), String> {
    let backend = open_backend(args)?;
    let state = backend.state(name).await.map_err(|e| e.to_string())?;
    let document = state.into_document();

    match output {
        Some(path) => {
            fs::write(path, document.as_bytes())
                .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
            eprintln!(
                "{}",
                format!("✓ Wrote state \"{}\" to {}.", name, path.display()).green()
            );
        }
        None => {
            let mut stdout = std::io::stdout();
            stdout
                .write_all(document.as_bytes())
                .and_then(|_| stdout.flush())
                .map_err(|e| e.to_string())?;
        }
    }
    Ok(())
}

async fn run_push(args: &BackendArgs, file: &Path, name: &str) -> Result<(), String> {
    let data = fs::read(file).map_err(|e| format!("Failed to read {}: {}", file.display(), e))?;
    if data.is_empty() {
        return Err(format!("{} is empty; refusing to push an empty state", file.display()));
    }

    let backend = open_backend(args)?;
    let client = backend.client(name).map_err(|e| e.to_string())?;

    debug!("pushing {} bytes to state {}", data.len(), name);
    println!("{}", format!("Pushing {} to \"{}\"...", file.display(), name).cyan());
    write_locked(name, &client, PUSH_OPERATION, StatePayload::new(data))
        .await
        .map_err(|e| e.to_string())?;

    println!("{}", format!("✓ State \"{}\" updated.", name).green().bold());
    Ok(())
}

async fn run_force_unlock(
    args: &BackendArgs,
    name: &str,
    lock_id: &str,
    force: bool,
) -> Result<(), String> {
    let backend = open_backend(args)?;
    let client = backend.client(name).map_err(|e| e.to_string())?;

    if !force {
        let question = format!("Do you really want to force-unlock state \"{}\"?", name);
        let detail = "Removing a lock held by a running process can corrupt state. Type 'yes' to confirm.";
        if !confirm(&question, detail)? {
            println!("{}", "Force-unlock cancelled.".yellow());
            return Ok(());
        }
    }

    debug!("force-unlocking state {} with lock ID {}", name, lock_id);
    client.unlock(lock_id).await.map_err(|e| e.to_string())?;
    println!(
        "{}",
        format!("✓ Released lock {} on \"{}\".", lock_id, name)
            .green()
            .bold()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_build_config() {
        let args = BackendArgs {
            address: Some("https://state.example.com".to_string()),
            lock_method: Some("PUT".to_string()),
            skip_cert_verification: true,
            timeout: Some(5),
            ..Default::default()
        };

        let config = load_backend_config(&args).unwrap();
        assert_eq!(config.backend_type, "http");
        assert_eq!(config.get_string("address"), Some("https://state.example.com"));
        assert_eq!(config.get_string("lock_method"), Some("PUT"));
        assert_eq!(config.get_bool("skip_cert_verification"), Some(true));
        assert_eq!(config.get_u64("timeout_seconds"), Some(5));
        assert_eq!(config.get_string("username"), None);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backend.json");
        fs::write(
            &path,
            r#"{"address": "http://from-file:8080", "username": "file-user"}"#,
        )
        .unwrap();

        let args = BackendArgs {
            config: Some(path),
            address: Some("http://from-flag:8080".to_string()),
            ..Default::default()
        };

        let config = load_backend_config(&args).unwrap();
        assert_eq!(config.get_string("address"), Some("http://from-flag:8080"));
        assert_eq!(config.get_string("username"), Some("file-user"));
    }

    #[test]
    fn test_open_backend_from_flags() {
        let args = BackendArgs {
            address: Some("http://localhost:8080/states".to_string()),
            ..Default::default()
        };
        assert!(open_backend(&args).is_ok());
    }

    #[test]
    fn test_open_backend_without_address() {
        let err = match open_backend(&BackendArgs::default()) {
            Err(err) => err,
            Ok(_) => panic!("Expected missing address error"),
        };
        assert!(err.contains("address"));
    }

    #[test]
    fn test_missing_config_file() {
        let args = BackendArgs {
            config: Some(PathBuf::from("/nonexistent/backend.json")),
            ..Default::default()
        };
        let err = load_backend_config(&args).unwrap_err();
        assert!(err.contains("Failed to read"));
    }

    #[test]
    fn test_parse_push_command() {
        let cli = Cli::try_parse_from([
            "tether",
            "--address",
            "http://localhost:8080",
            "push",
            "state.json",
            "--name",
            "prod",
        ])
        .unwrap();

        assert_eq!(cli.backend.address.as_deref(), Some("http://localhost:8080"));
        match cli.command {
            Commands::Push { file, name } => {
                assert_eq!(file, PathBuf::from("state.json"));
                assert_eq!(name, "prod");
            }
            _ => panic!("Expected push command"),
        }
    }
}

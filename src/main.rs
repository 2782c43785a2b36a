use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use hrdesk::api::{AuthSession, CachedCatalogSource, CatalogSource, HttpClient, RecordSource};
use hrdesk::app::App;
use hrdesk::config::Config;
use hrdesk::form::DraftStore;
use hrdesk::logging;
use hrdesk::records::RecordKind;
use hrdesk::session::{FormSession, SessionStatus};
use hrdesk::storage::{FileStore, KeyValueStore};
use hrdesk::ui::install_panic_hook;

#[derive(Parser)]
#[command(name = "hrdesk")]
#[command(about = "Terminal console for employee, department and position records")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or edit an employee
    Employee {
        #[command(subcommand)]
        action: FormCommand,
    },

    /// Create or edit a department
    Department {
        #[command(subcommand)]
        action: FormCommand,
    },

    /// Create or edit a job position
    Position {
        #[command(subcommand)]
        action: FormCommand,
    },

    /// Sign in and store the session tokens
    Login {
        /// Username (prompted when omitted)
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Forget the stored session tokens
    Logout,

    /// Manage saved form drafts
    Drafts {
        #[command(subcommand)]
        action: DraftsCommand,
    },

    /// Inspect or write the configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum FormCommand {
    /// Open an empty form
    New,
    /// Load record <id> and open it for editing
    Edit { id: i64 },
}

#[derive(Subcommand)]
enum DraftsCommand {
    /// Remove every stored draft
    Clear,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,
    /// Write the effective configuration to the user config file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

impl FormCommand {
    fn record_id(&self) -> Option<i64> {
        match self {
            FormCommand::New => None,
            FormCommand::Edit { id } => Some(*id),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())?;

    let form = match &cli.command {
        Commands::Employee { action } => Some((RecordKind::Employee, action.record_id())),
        Commands::Department { action } => Some((RecordKind::Department, action.record_id())),
        Commands::Position { action } => Some((RecordKind::Position, action.record_id())),
        _ => None,
    };

    let logging_handle = logging::init_logging(&config, form.is_some(), cli.debug)?;

    if let Some((kind, id)) = form {
        return run_form(config, kind, id, logging_handle.log_file_path).await;
    }

    match cli.command {
        Commands::Login { username } => cmd_login(&config, username).await?,
        Commands::Logout => cmd_logout(&config),
        Commands::Drafts {
            action: DraftsCommand::Clear,
        } => cmd_drafts_clear(&config),
        Commands::Config { action } => cmd_config(&config, action)?,
        Commands::Employee { .. } | Commands::Department { .. } | Commands::Position { .. } => {}
    }

    Ok(())
}

fn open_store(config: &Config) -> Arc<dyn KeyValueStore> {
    Arc::new(FileStore::new(config.storage_path()))
}

async fn run_form(
    config: Config,
    kind: RecordKind,
    id: Option<i64>,
    log_file_path: Option<PathBuf>,
) -> Result<()> {
    let store = open_store(&config);
    let auth = AuthSession::new(Arc::clone(&store));
    if !auth.is_authenticated() {
        eprintln!("Sin sesión activa; ejecuta `hrdesk login` si el servidor la requiere.");
    }

    let client = Arc::new(HttpClient::new(&config.api, auth)?);

    let existing = match id {
        Some(id) => Some(
            client
                .fetch_record(kind, id)
                .await
                .with_context(|| format!("Failed to load {} #{}", kind.label(), id))?,
        ),
        None => None,
    };

    let session = FormSession::mount(kind.schema(), existing, store, &config.forms);
    let catalogs: Arc<dyn CatalogSource> = Arc::new(CachedCatalogSource::new(
        Arc::clone(&client),
        config.api.catalog_ttl(),
    ));

    install_panic_hook();
    let mut app = App::new(config, session, catalogs, client);
    let result = app.run().await;

    if let SessionStatus::Saved(saved_id) = app.session().status() {
        match saved_id {
            Some(saved_id) => println!("Guardado: {} #{}", kind.label(), saved_id),
            None => println!("Guardado: {}", kind.label()),
        }
    }

    if let Some(log_path) = log_file_path {
        if let Ok(metadata) = log_path.metadata() {
            if metadata.len() > 0 {
                eprintln!("Session log: {}", log_path.display());
            }
        }
    }

    result
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn cmd_login(config: &Config, username: Option<String>) -> Result<()> {
    let username = match username {
        Some(username) => username,
        None => prompt("Usuario")?,
    };
    let password = prompt("Contraseña")?;

    let auth = AuthSession::new(open_store(config));
    let client = HttpClient::new(&config.api, auth.clone())?;
    let user = auth
        .login(&client, username.trim(), &password)
        .await
        .context("Login failed")?;

    let name = user
        .username
        .or(user.email)
        .unwrap_or_else(|| username.trim().to_string());
    println!("Sesión iniciada como {}", name);
    Ok(())
}

fn cmd_logout(config: &Config) {
    AuthSession::new(open_store(config)).logout();
    println!("Sesión cerrada");
}

fn cmd_drafts_clear(config: &Config) {
    let removed = DraftStore::new(open_store(config)).clear_all();
    println!("Borradores eliminados: {}", removed);
}

fn cmd_config(config: &Config, action: ConfigCommand) -> Result<()> {
    match action {
        ConfigCommand::Show => {
            let toml_str =
                toml::to_string_pretty(config).context("Failed to serialize config to TOML")?;
            print!("{}", toml_str);
        }
        ConfigCommand::Init { force } => {
            let path =
                Config::user_config_path().context("Could not determine user config directory")?;
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            let written = config.save()?;
            println!("Configuración escrita en {}", written.display());
        }
    }
    Ok(())
}

//! Binary entrypoint for the playerstats CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml`
//! - `register --email <e> --username <n>` - create an account and its profile
//! - `status --email <e>` - sign in and print the profile
//! - `explore --email <e> --site <name>` - grant an explore site's reward
//! - `rename --email <e> --username <n>` - change the display name
//!
//! Passwords come from `--password` or a no-echo prompt.
//!
//! See the library crate docs for module-level details: `playerstats::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};

use playerstats::app::{ClientError, GameClient, ProfileView, RegistrationForm};
use playerstats::config::Config;
use playerstats::sync::RenameOutcome;

#[derive(Parser)]
#[command(name = "playerstats")]
#[command(about = "Player progression and profile sync client")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Create an account and its profile
    Register {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        username: String,
        /// Password (prompted when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Sign in and show the profile
    Status {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Explore a site and collect its reward
    Explore {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        site: String,
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Change the display name
    Rename {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        init_logging(&None, cli.verbose);
        Config::create_default(&cli.config).await?;
        info!("Configuration file created at {}", cli.config);
        return Ok(());
    }

    let config = Config::load(&cli.config).await?;
    init_logging(&Some(config.clone()), cli.verbose);
    let client = GameClient::from_config(&config)?;

    let outcome = match cli.command {
        Commands::Init => Ok(()),
        Commands::Register {
            email,
            username,
            password,
        } => {
            let (password, password_confirm) = match password {
                Some(p) => (p.clone(), p),
                None => (
                    rpassword::prompt_password("Password: ")?,
                    rpassword::prompt_password("Confirm password: ")?,
                ),
            };
            let form = RegistrationForm {
                username,
                email,
                password,
                password_confirm,
            };
            client.register(&form).await.map(|msg| println!("{msg}"))
        }
        Commands::Status { email, password } => {
            signed_in(&client, &email, password, |client| async move {
                if let Some(view) = client.profile_view() {
                    println!("{view}");
                }
                Ok(())
            })
            .await?
        }
        Commands::Explore {
            email,
            site,
            password,
        } => {
            signed_in(&client, &email, password, |client| async move {
                let profile = client.explore(&site).await?;
                println!("Explored {}.", site);
                println!("{}", ProfileView::from(&profile));
                Ok(())
            })
            .await?
        }
        Commands::Rename {
            email,
            username,
            password,
        } => {
            signed_in(&client, &email, password, |client| async move {
                match client.rename(&username).await? {
                    RenameOutcome::Complete => println!("Username set to {}", username),
                    RenameOutcome::IdentityNotUpdated { reason } => {
                        println!("Username set to {} ({})", username, reason)
                    }
                }
                Ok(())
            })
            .await?
        }
    };

    if let Err(e) = outcome {
        warn!("command failed: {}", e);
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }
    Ok(())
}

/// Log in, run `action`, and log out again whatever `action` returned.
async fn signed_in<'a, F, Fut>(
    client: &'a GameClient,
    email: &str,
    password: Option<String>,
    action: F,
) -> Result<Result<(), ClientError>>
where
    F: FnOnce(&'a GameClient) -> Fut,
    Fut: std::future::Future<Output = Result<(), ClientError>>,
{
    let password = match password {
        Some(p) => p,
        None => rpassword::prompt_password("Password: ")?,
    };
    if let Err(e) = client.login(email, &password).await {
        return Ok(Err(e));
    }
    let result = action(client).await;
    if let Err(e) = client.logout().await {
        warn!("logout failed: {}", e);
    }
    Ok(result)
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });
    let security_path = config
        .as_ref()
        .and_then(|c| c.logging.security_file.clone());

    match file {
        Some(f) => {
            let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
            // Only echo to the console when someone is watching it
            let is_tty = atty::is(atty::Stream::Stdout);
            builder.format(move |fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                let line = format!("{} [{}] {}", ts, record.level(), record.args());

                if let Ok(mut guard) = write_mutex.lock() {
                    let _ = writeln!(guard, "{}", line);
                }

                if record.target() == "security" {
                    if let Some(ref sec_path) = security_path {
                        if let Ok(mut sf) = std::fs::OpenOptions::new()
                            .create(true)
                            .append(true)
                            .open(sec_path)
                        {
                            let _ = writeln!(sf, "{}", line);
                        }
                    }
                }

                if is_tty {
                    writeln!(fmt, "{}", line)
                } else {
                    Ok(())
                }
            });
        }
        None => {
            builder.format(|fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
            });
        }
    }
    let _ = builder.try_init();
}

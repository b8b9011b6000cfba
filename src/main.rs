use std::error::Error;
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex};

use clap::{Arg, ArgMatches, Command};
use log::debug;

use one_do_account::utils::io::{prompt, prompt_password};
use one_do_account::utils::logging::initialize_logging;
use one_do_account::utils::time::format_timestamp_millis;
use one_do_account::{
    AccountError, AppConfig, JsonFileStore, ProfileEditor, SessionManager, SessionState, DEFAULT_CONFIG_FILE,
};

fn build_cli() -> Command {
    Command::new("one-do-account")
        .about("Register accounts, log in and manage your profile")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_name("FILE")
                .help("Path to the JSON config file"),
        )
        .arg(
            Arg::new("store")
                .long("store")
                .global(true)
                .value_name("FILE")
                .help("Path to the account store, overriding the config"),
        )
        .subcommand(
            Command::new("init-config")
                .about("Write the current settings to the config file")
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(clap::ArgAction::SetTrue)
                        .help("Overwrite an existing config file"),
                ),
        )
        .subcommand(
            Command::new("register")
                .about("Create a new account")
                .arg(Arg::new("name").help("Full name").required(true))
                .arg(Arg::new("email").help("Email address").required(true))
                .arg(
                    Arg::new("password")
                        .long("password")
                        .help("Password (prompted for when omitted)"),
                ),
        )
        .subcommand(
            Command::new("login")
                .about("Log in to an existing account")
                .arg(Arg::new("email").help("Email address").required(true))
                .arg(
                    Arg::new("password")
                        .long("password")
                        .help("Password (prompted for when omitted)"),
                ),
        )
        .subcommand(Command::new("logout").about("End the current session"))
        .subcommand(Command::new("whoami").about("Show the logged-in user"))
        .subcommand(
            Command::new("profile")
                .about("Show or edit the logged-in user's profile")
                .arg(Arg::new("name").long("name").help("New full name"))
                .arg(Arg::new("email").long("email").help("New email address"))
                .arg(
                    Arg::new("interactive")
                        .long("interactive")
                        .short('i')
                        .action(clap::ArgAction::SetTrue)
                        .help("Prompt for each field"),
                ),
        )
}

fn password_arg(matches: &ArgMatches) -> std::io::Result<String> {
    match matches.get_one::<String>("password") {
        Some(password) => Ok(password.clone()),
        None => prompt_password("Password"),
    }
}

fn print_profile(manager: &SessionManager) {
    match manager.state() {
        SessionState::LoggedIn(user) => {
            println!("\nUser Profile");
            println!("------------");
            println!("Name: {}", user.name);
            println!("Email: {}", user.email);
            println!("Registered: {}", format_timestamp_millis(user.id.0));
        }
        SessionState::LoggedOut => println!("Not logged in."),
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let matches = build_cli().get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let mut config = AppConfig::load(&config_path)?;
    if let Some(store) = matches.get_one::<String>("store") {
        config.store_path = PathBuf::from(store);
    }

    initialize_logging(config.level_filter()?, config.log_file.as_deref())?;

    if let Some(("init-config", sub_matches)) = matches.subcommand() {
        if config_path.exists() && !sub_matches.get_flag("force") {
            return Err(format!(
                "{} already exists; pass --force to overwrite it",
                config_path.display()
            )
            .into());
        }
        config.save(&config_path)?;
        println!("Wrote {}", config_path.display());
        return Ok(());
    }

    debug!("Using store {}", config.store_path.display());

    let store = Arc::new(JsonFileStore::open(&config.store_path)?);
    let mut manager = SessionManager::open_with_keys(store, &config.users_key, &config.session_key)?;

    match matches.subcommand() {
        Some(("register", sub_matches)) => {
            let name = sub_matches.get_one::<String>("name").cloned().unwrap_or_default();
            let email = sub_matches.get_one::<String>("email").cloned().unwrap_or_default();
            let password = password_arg(sub_matches)?;

            let user = manager.register(&name, &email, &password)?;
            println!("Registration successful for {}. You can now log in.", user.email);
        }
        Some(("login", sub_matches)) => {
            let email = sub_matches.get_one::<String>("email").cloned().unwrap_or_default();
            let password = password_arg(sub_matches)?;

            let session = manager.login(&email, &password)?;
            println!("Welcome, {}!", session.name);
        }
        Some(("logout", _)) => {
            manager.logout()?;
            println!("Logged out.");
        }
        Some(("whoami", _)) => match manager.current_session() {
            Some(user) => println!("{} <{}>", user.name, user.email),
            None => println!("Not logged in."),
        },
        Some(("profile", sub_matches)) => {
            let name = sub_matches.get_one::<String>("name").cloned();
            let email = sub_matches.get_one::<String>("email").cloned();
            let interactive = sub_matches.get_flag("interactive");

            if name.is_none() && email.is_none() && !interactive {
                print_profile(&manager);
                return Ok(());
            }

            let session = Arc::new(Mutex::new(manager));
            let editor = ProfileEditor::new(Arc::clone(&session), config.save_latency());

            let mut draft = editor.begin_edit()?;
            if interactive {
                let typed = prompt(&format!("Full name [{}]", draft.name))?;
                if !typed.is_empty() {
                    draft.name = typed;
                }
                let typed = prompt(&format!("Email [{}]", draft.email))?;
                if !typed.is_empty() {
                    draft.email = typed;
                }
            }
            if let Some(name) = name {
                draft.name = name;
            }
            if let Some(email) = email {
                draft.email = email;
            }

            println!("Saving...");
            let updated = editor.save(draft).await?;
            println!("Profile updated successfully! {} <{}>", updated.name, updated.email);
        }
        _ => unreachable!("clap requires a subcommand"),
    }

    Ok(())
}

/// Exit status 2 for mistakes the user can fix by retrying with other input, 1 otherwise
fn exit_code(err: &(dyn Error + 'static)) -> i32 {
    match err.downcast_ref::<AccountError>() {
        Some(e) if e.is_user_error() => 2,
        _ => 1,
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(exit_code(e.as_ref()));
    }
}

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use bestgame_client::api::{ApiClient, AuthApi, ParsedBody, RequestOptions};
use bestgame_client::auth::BrowserNavigator;
use bestgame_client::config::{ClientConfig, API_URL_ENV};
use bestgame_client::session::AuthSession;

#[derive(Parser, Debug)]
#[command(name = "bestgame", version, about = "BestGameAccount storefront client")]
struct Cli {
    /// Backend base URL
    #[arg(long, env = API_URL_ENV, global = true)]
    api_url: Option<String>,

    /// Never send cookies, authenticate with bearer tokens only
    #[arg(long, global = true)]
    no_cookies: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the issued tokens
    Login {
        email: String,
        #[arg(long, env = "BESTGAME_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        email: String,
        #[arg(long, env = "BESTGAME_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Show the signed-in user
    Profile,
    /// Sign out and forget stored tokens
    Logout,
    /// Mint a new access token
    Refresh,
    /// GET an arbitrary backend path
    Get {
        path: String,
        /// Query parameter, repeatable
        #[arg(long = "query", short, value_parser = parse_key_value)]
        query: Vec<(String, String)>,
    },
    /// Show the effective configuration
    Config {
        /// Write it to the config file
        #[arg(long)]
        save: bool,
    },
    /// POST an arbitrary backend path
    Post {
        path: String,
        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{}`", s))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    bestgame_client::init_logging();

    let cli = Cli::parse();

    let mut config = ClientConfig::load();
    config.apply_api_url_override(cli.api_url);
    if cli.no_cookies {
        config.cookies_enabled = false;
    }

    if let Command::Config { save } = cli.command {
        if save {
            config.save().context("Failed to save config")?;
            eprintln!("Config saved");
        }
        return print_json(&serde_json::to_value(&config)?);
    }

    let store = config
        .open_token_store()
        .context("Failed to open token storage")?;
    let navigator = Arc::new(BrowserNavigator::new(config.frontend_url.clone()));
    let client = Arc::new(ApiClient::new(config, store, navigator)?);
    let session = AuthSession::new(AuthApi::new(client.clone()));

    match cli.command {
        Command::Login { email, password } => {
            match session.login(&email, &password).await? {
                Some(landing) => println!("Signed in, landing on {}", landing),
                None => println!("Signed in, but the profile could not be loaded"),
            }
        }
        Command::Register { email, password } => {
            match session.register(&email, &password).await? {
                Some(landing) => println!("Registered and signed in, landing on {}", landing),
                None => println!("Registered, but the profile could not be loaded"),
            }
        }
        Command::Profile => match session.fetch_profile().await {
            Some(profile) => print_json(&serde_json::to_value(&profile)?)?,
            None => anyhow::bail!("Not signed in"),
        },
        Command::Logout => {
            session.logout().await;
            println!("Signed out");
        }
        Command::Refresh => {
            session.api().refresh().await?;
            println!("Session refreshed");
        }
        Command::Get { path, query } => {
            let options = query
                .into_iter()
                .fold(RequestOptions::get(), |options, (k, v)| options.query(k, v));
            let body = client.request_json::<Value>(&path, options).await?;
            print_json(&body)?;
        }
        Command::Post { path, body } => {
            let mut options = RequestOptions::post();
            if let Some(raw) = body {
                let json: Value = serde_json::from_str(&raw).context("Invalid JSON body")?;
                options = options.body(json);
            }
            let body = client.request(&path, options).await?;
            match body {
                ParsedBody::Json(json) => print_json(&json)?,
                ParsedBody::Text(text) => println!("{}", text),
            }
        }
        Command::Config { .. } => {}
    }

    Ok(())
}

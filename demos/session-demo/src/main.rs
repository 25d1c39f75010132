//! Redirect Sign-In Demo
//!
//! Walks through the redirect-based OAuth flow against an in-process provider:
//! 1. `login` prints the provider's authorize URL
//! 2. Paste the callback URI the browser would hand back
//! 3. The deep link is matched and forwarded; the provider reports the session
//! 4. Every state transition is rendered as it is observed
//!
//! Configuration comes from `AUTH_PROVIDER_URL`, `AUTH_PROVIDER_API_KEY` and
//! `AUTH_CALLBACK_SCHEME`; demo values are used for anything missing unless
//! `--strict` is passed, which shows how missing configuration surfaces.
//!
//! Run with: cargo run -p session-demo

mod provider;

use auth_session::{
    AuthConfig, AuthManager, AuthState, CallbackTarget, CommandOutcome, OAuthProvider,
};
use futures::StreamExt;
use provider::DemoProvider;
use tokio::io::{AsyncBufReadExt, BufReader};

const DEMO_SCHEME: &str = "io.example.demo";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("auth_session=info,session_demo=info")
                }),
        )
        .init();

    let strict = std::env::args().any(|a| a == "--strict");
    let config = load_config(strict);

    println!("╔═════════════════════════════════════════════════════════╗");
    println!("║               Redirect Sign-In Demo                     ║");
    println!("╚═════════════════════════════════════════════════════════╝");
    println!();
    println!("Callback URI: {}", config.callback.redirect_uri());
    if let Err(e) = config.validate() {
        println!("Configuration incomplete ({e}); provider calls will fail.");
    }
    println!();
    print_help();

    let manager = AuthManager::new(config.clone(), DemoProvider::new(config));

    let mut states = Box::pin(manager.observe());
    let renderer = tokio::spawn(async move {
        while let Some(state) = states.next().await {
            render(&state);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let mut parts = line.split_whitespace();
        match parts.next().unwrap_or_default() {
            "" => {}
            "login" => {
                let provider = parts.next().map_or(OAuthProvider::Github, OAuthProvider::from);
                if let CommandOutcome::Failed { transient, .. } = manager.sign_in(provider).await {
                    println!("  {}", if transient { "try again" } else { "check the configuration" });
                }
            }
            "logout" => {
                if manager.sign_out().await.is_transient() {
                    println!("  try again");
                }
            }
            "status" => {
                println!("  current: {}", describe(&manager.current()));
                println!("  subscribed: {}", manager.is_running());
            }
            "help" => print_help(),
            "quit" | "exit" => break,
            uri if uri.contains("://") => {
                let outcome = manager.handle_deep_link(uri).await;
                println!("  deep link: {outcome:?}");
            }
            other => println!("  unknown command: {other}"),
        }
    }

    manager.shutdown();
    let end = manager.subscription_end().await;
    tracing::info!(?end, "Status subscription stopped");
    renderer.await?;
    Ok(())
}

fn load_config(strict: bool) -> AuthConfig {
    let mut config = AuthConfig::from_env();
    if strict {
        return config;
    }
    if config.endpoint_url.is_empty() {
        config.endpoint_url = "https://demo.supabase.co".to_string();
    }
    if config.api_key.is_empty() {
        config.api_key = "demo-anon-key".to_string();
    }
    if config.callback.scheme.is_empty() {
        config.callback = CallbackTarget::new(DEMO_SCHEME).with_host(config.callback.host.clone());
    }
    config
}

fn describe(state: &AuthState) -> String {
    match state {
        AuthState::Loading => "loading".to_string(),
        AuthState::SignedIn { session } => {
            let email = session.email.as_deref().unwrap_or("no email");
            format!("signed in as {} ({email})", session.user_id())
        }
        AuthState::SignedOut => "signed out".to_string(),
        AuthState::Error { message } => format!("error: {message}"),
    }
}

fn render(state: &AuthState) {
    println!("→ {}", describe(state));
}

fn print_help() {
    println!("Commands:");
    println!("  login [github|google|gitlab]   start a redirect sign-in");
    println!("  <callback uri>                 paste the URI the browser redirected to");
    println!("  logout                         end the session");
    println!("  status                         show the current state");
    println!("  quit                           exit");
    println!();
}

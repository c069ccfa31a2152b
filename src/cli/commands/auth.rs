use clap::Subcommand;
use serde_json::json;

use crate::cli::client::ApiClient;
use crate::cli::config::SessionStore;
use crate::cli::utils::{output_success, prompt};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Login to server")]
    Login {
        #[arg(help = "Username")]
        username: String,
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Logout from server")]
    Logout,

    #[command(about = "Show current authentication status")]
    Status,

    #[command(about = "Refresh authentication token")]
    Refresh,

    #[command(about = "Show current user information")]
    Whoami,
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut client = ApiClient::new(SessionStore::open_default()?)?;

    match cmd {
        AuthCommands::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt("Password")?,
            };
            let data = client.login(&username, &password).await?;
            output_success(
                &output_format,
                &format!("Logged in as {}", username),
                Some(json!({ "user": data.get("user"), "expiresIn": data.get("expiresIn") })),
            )
        }
        AuthCommands::Logout => {
            client.logout().await?;
            output_success(&output_format, "Logged out", None)
        }
        AuthCommands::Status => {
            let session = client.session();
            let message = match &session.user {
                Some(user) if session.is_logged_in() => {
                    format!("Logged in to {} as {} ({})", session.base_url, user.username, user.role)
                }
                _ => format!("Not logged in to {}", session.base_url),
            };
            output_success(
                &output_format,
                &message,
                Some(json!({
                    "baseUrl": session.base_url,
                    "loggedIn": session.is_logged_in(),
                    "user": session.user,
                    "updatedAt": session.updated_at,
                })),
            )
        }
        AuthCommands::Refresh => {
            client.refresh().await?;
            output_success(&output_format, "Token refreshed", None)
        }
        AuthCommands::Whoami => {
            let user = client.get("/api/auth/whoami").await?;
            output_success(&output_format, "Current user", Some(user))
        }
    }
}

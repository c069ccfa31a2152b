use clap::Subcommand;
use serde_json::json;

use crate::cli::client::ApiClient;
use crate::cli::config::{ping_server, ServerStatus, SessionStore};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum ServerCommands {
    #[command(about = "Point the CLI at a server (clears the current login)")]
    Set {
        #[arg(help = "Server URL, e.g. https://lms.example.edu")]
        url: String,
    },

    #[command(about = "Show the configured server")]
    Show,

    #[command(about = "Health check the configured server")]
    Ping,
}

pub async fn handle(cmd: ServerCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut client = ApiClient::new(SessionStore::open_default()?)?;

    match cmd {
        ServerCommands::Set { url } => {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("server URL must start with http:// or https://");
            }
            client.set_base_url(&url)?;
            output_success(
                &output_format,
                &format!("Server set to {}", client.session().base_url),
                Some(json!({ "baseUrl": client.session().base_url })),
            )
        }
        ServerCommands::Show => {
            let session = client.session();
            output_success(
                &output_format,
                &format!("Current server: {}", session.base_url),
                Some(json!({
                    "baseUrl": session.base_url,
                    "loggedIn": session.is_logged_in(),
                })),
            )
        }
        ServerCommands::Ping => {
            let base_url = client.session().base_url.clone();
            match ping_server(&base_url).await {
                ServerStatus::Up => output_success(
                    &output_format,
                    &format!("{} is up", base_url),
                    Some(json!({ "baseUrl": base_url, "status": ServerStatus::Up })),
                ),
                ServerStatus::Down => anyhow::bail!("{} is not responding", base_url),
            }
        }
    }
}

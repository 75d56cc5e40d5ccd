//! Session command: show what the cookie header seeds

use clap::Args;
use serde_json::json;

use super::{Cli, CliError, OutputFormat};

/// Arguments for the session command
#[derive(Args, Debug)]
pub struct SessionArgs {}

impl SessionArgs {
    /// Print the seeded cookie header and whether a session token is present
    pub fn execute(&self, cli: &Cli) -> Result<(), CliError> {
        let config = cli.client_config()?;
        let session = cli.session(&config);
        let header = session.current_cookie_header();
        let has_token = session.session_token().is_some();

        match cli.output_format {
            OutputFormat::Json => println!(
                "{}",
                json!({
                    "cookies": session.len(),
                    "cookie_header": header,
                    "session_token": has_token,
                })
            ),
            OutputFormat::Human => {
                println!("Cookies ({}): {header}", session.len());
                println!(
                    "Session token: {}",
                    if has_token { "present" } else { "missing" }
                );
            }
        }
        Ok(())
    }
}

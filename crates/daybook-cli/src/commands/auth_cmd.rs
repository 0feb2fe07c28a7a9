use crate::cli::AuthCommands;
use crate::commands::common::backend_auth_client;
use crate::config::CliConfig;
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands) -> Result<(), CliError> {
    let config = CliConfig::load().map_err(CliError::Config)?;
    let client = backend_auth_client(&config)?;

    match command {
        AuthCommands::Login { email, password } => {
            let session = client
                .sign_in(&email, &password)
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            let email_label = session.user.email.as_deref().unwrap_or("(no email)");
            println!("Signed in as {email_label}");
            Ok(())
        }
        AuthCommands::Status => {
            let session = client
                .restore_session()
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            match session {
                Some(session) => {
                    let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                    println!(
                        "Signed in as {} (user id {}, expires_at={})",
                        email_label, session.user.id, session.expires_at
                    );
                }
                None => println!("Not signed in."),
            }
            Ok(())
        }
        AuthCommands::Logout => {
            let session = client
                .restore_session()
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            match session {
                Some(session) => {
                    client
                        .sign_out(&session.access_token)
                        .await
                        .map_err(|error| CliError::Auth(error.to_string()))?;
                    println!("Signed out.");
                }
                None => println!("Not signed in."),
            }
            Ok(())
        }
    }
}

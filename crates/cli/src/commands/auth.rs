//! `stocktake login` / `stocktake logout`.

use secrecy::SecretString;
use stocktake_client::{ClientError, InventoryClient};
use tracing::info;

use super::CliError;

pub async fn login(client: &InventoryClient, token: String) -> Result<(), CliError> {
    client
        .tokens()
        .login(SecretString::from(token))
        .await
        .map_err(ClientError::from)?;
    client.clear_cache();
    info!(path = %client.config().token_file.display(), "Token saved");
    Ok(())
}

pub async fn logout(client: &InventoryClient) -> Result<(), CliError> {
    client.tokens().logout().await.map_err(ClientError::from)?;
    client.clear_cache();
    info!("Logged out");
    Ok(())
}

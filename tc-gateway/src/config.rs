use tc_config::load_config;
use tc_config::shared::GatewayConfig;

use crate::error::{GatewayError, GatewayResult};

/// Loads and validates the gateway configuration from `./configuration`.
pub fn load_gateway_config() -> GatewayResult<GatewayConfig> {
    let config = load_config::<GatewayConfig>().map_err(GatewayError::config)?;
    config.validate().map_err(GatewayError::config)?;

    Ok(config)
}

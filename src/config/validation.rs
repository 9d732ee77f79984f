use crate::config::types::{Config, CrawlerConfig, OutputConfig, RenderConfig, ServerConfig};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_render_config(&config.render)?;
    validate_output_config(&config.output)?;
    validate_server_config(&config.server)?;
    Ok(())
}

/// Validates crawl limits
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent < 1 || config.max_concurrent > 64 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent must be between 1 and 64, got {}",
            config.max_concurrent
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max-pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    Ok(())
}

/// Validates render timeouts and identification
fn validate_render_config(config: &RenderConfig) -> Result<(), ConfigError> {
    if config.navigation_timeout == 0 {
        return Err(ConfigError::Validation(
            "navigation-timeout must be > 0ms".to_string(),
        ));
    }

    if config.network_idle == 0 {
        return Err(ConfigError::Validation(
            "network-idle must be > 0ms".to_string(),
        ));
    }

    if config.settle_timeout <= config.network_idle {
        return Err(ConfigError::Validation(format!(
            "settle-timeout ({}ms) must be greater than network-idle ({}ms)",
            config.settle_timeout, config.network_idle
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if let Some(path) = &config.chrome_executable {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "chrome-executable cannot be an empty path".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.backups_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "backups-dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates server configuration
fn validate_server_config(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.host.trim().is_empty() {
        return Err(ConfigError::Validation("host cannot be empty".to_string()));
    }

    Ok(())
}

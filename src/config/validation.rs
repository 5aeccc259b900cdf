use crate::config::types::{
    Config, CrawlerConfig, DistanceConfig, LoaderConfig, SiteConfig, UserAgentConfig,
};
use crate::url::{in_domain, parse_domain};
use crate::ConfigError;
use url::Url;

/// Upper bound for any worker pool size
const MAX_WORKERS: usize = 512;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_loader_config(&config.loader)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_site_config(&config.site)?;
    validate_distance_config(&config.distance)?;
    Ok(())
}

/// Validates crawler configuration
///
/// Also checked when a crawler is built, since its settings need not come
/// from a config file.
pub fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    validate_worker_count("fetch_workers", config.fetch_workers)?;
    validate_worker_count("check_workers", config.check_workers)?;

    if config.checkpoint_interval_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "checkpoint_interval_secs must be >= 1, got {}",
            config.checkpoint_interval_secs
        )));
    }

    if config.result_stream_capacity < 1 {
        return Err(ConfigError::Validation(
            "result_stream_capacity must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_worker_count(name: &str, count: usize) -> Result<(), ConfigError> {
    if count < 1 || count > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "{} must be between 1 and {}, got {}",
            name, MAX_WORKERS, count
        )));
    }
    Ok(())
}

/// Validates loader configuration
fn validate_loader_config(config: &LoaderConfig) -> Result<(), ConfigError> {
    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "connect_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // The name is the product token of the header
    let name = &config.crawler_name;
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '-') {
        return Err(ConfigError::Validation(format!(
            "crawler_name must be non-empty alphanumerics and hyphens, got '{}'",
            name
        )));
    }

    if config.crawler_version.trim().is_empty() {
        return Err(ConfigError::Validation(
            "crawler_version cannot be empty".to_string(),
        ));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)
}

/// Validates the site section: the domain and every seed inside it
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let domain = parse_domain(&config.domain)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid domain '{}': {}", config.domain, e)))?;

    for seed in &config.seeds {
        let url = Url::parse(seed).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e))
        })?;

        if !in_domain(&domain, &url) {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' is outside domain '{}'",
                seed, domain
            )));
        }
    }

    if let Some(archive) = &config.archive {
        if archive.trim().is_empty() {
            return Err(ConfigError::Validation(
                "archive cannot be an empty path".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates distance engine configuration
fn validate_distance_config(config: &DistanceConfig) -> Result<(), ConfigError> {
    validate_worker_count("distance workers", config.workers)
}

/// Checks that an email has a local part and a dotted domain
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.contains('@')
        }
        None => false,
    };

    if !valid {
        return Err(ConfigError::Validation(format!(
            "Invalid contact_email: '{}'",
            email
        )));
    }
    Ok(())
}

use std::env;
use std::path::PathBuf;

use crate::error::{QuakeError, QuakeResult};

const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_SMTP_PORT: u16 = 587;

/// Application configuration loaded from environment variables.
/// Contains only secrets and endpoints; tunables live in the TOML `FileConfig`.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // Text generation (OpenAI-compatible endpoint)
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,

    // News search
    pub tavily_api_key: String,

    // Email transport
    pub smtp: Option<SmtpConfig>,

    // Optional TOML tunables
    pub file_config_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub sender: String,
}

impl Config {
    /// Load configuration from the environment (and `.env` when present).
    pub fn from_env() -> QuakeResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> QuakeResult<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| QuakeError::Config(format!("{key} environment variable is required")))
        };

        let database_url = match get("DATABASE_URL") {
            Some(url) => url,
            None => database_url_from_parts(&get)?,
        };

        let llm_api_key = match get("LLM_API_KEY") {
            Some(key) => key,
            None => required("API_KEY").map_err(|_| {
                QuakeError::Config("LLM_API_KEY (or API_KEY) environment variable is required".into())
            })?,
        };

        let smtp = match get("SMTP_HOST") {
            Some(host) => {
                let port = match get("SMTP_PORT") {
                    Some(port) => port
                        .parse()
                        .map_err(|_| QuakeError::Config(format!("SMTP_PORT must be a number, got {port}")))?,
                    None => DEFAULT_SMTP_PORT,
                };
                let username = required("SMTP_USERNAME")?;
                Some(SmtpConfig {
                    host,
                    port,
                    sender: get("SMTP_SENDER").unwrap_or_else(|| username.clone()),
                    username,
                    password: required("SMTP_PASSWORD")?,
                })
            }
            None => None,
        };

        Ok(Self {
            database_url,
            llm_api_key,
            llm_base_url: get("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            llm_model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            tavily_api_key: required("TAVILY_API_KEY")?,
            smtp,
            file_config_path: get("QUAKEWATCH_CONFIG").map(PathBuf::from),
        })
    }

    /// Log which keys are set, showing only a short prefix of each secret.
    pub fn log_redacted(&self) {
        fn preview(val: &str) -> String {
            let n = val.char_indices().nth(5).map(|(i, _)| i).unwrap_or(val.len());
            format!("{}...({} chars)", &val[..n], val.len())
        }

        tracing::info!("Config loaded:");
        tracing::info!("  DATABASE_URL: {}", redact_url(&self.database_url));
        tracing::info!("  LLM_API_KEY: {}", preview(&self.llm_api_key));
        tracing::info!("  LLM_BASE_URL: {}", self.llm_base_url);
        tracing::info!("  LLM_MODEL: {}", self.llm_model);
        tracing::info!("  TAVILY_API_KEY: {}", preview(&self.tavily_api_key));
        match &self.smtp {
            Some(smtp) => tracing::info!(
                "  SMTP: {}:{} as {} (password {})",
                smtp.host,
                smtp.port,
                smtp.username,
                preview(&smtp.password)
            ),
            None => tracing::info!("  SMTP: <not set>"),
        }
    }
}

fn database_url_from_parts(get: &impl Fn(&str) -> Option<String>) -> QuakeResult<String> {
    let part = |key: &str| {
        get(key).ok_or_else(|| {
            QuakeError::Config(format!(
                "DATABASE_URL or {key} (with DB_USER, DB_PASSWORD, DB_HOST, DB_NAME) is required"
            ))
        })
    };
    Ok(format!(
        "postgres://{}:{}@{}:{}/{}",
        part("DB_USER")?,
        part("DB_PASSWORD")?,
        part("DB_HOST")?,
        get("DB_PORT").unwrap_or_else(|| "5432".to_string()),
        part("DB_NAME")?,
    ))
}

/// Hide the password portion of a connection URL.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            let credentials = &url[scheme_end + 3..at];
            let user = credentials.split(':').next().unwrap_or_default();
            format!("{}{}:***{}", &url[..scheme_end + 3], user, &url[at..])
        }
        _ => url.to_string(),
    }
}

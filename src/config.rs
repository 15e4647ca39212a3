use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::{env, fmt, path::PathBuf, str::FromStr, time::Duration};

use crate::services::media_policy::{DEFAULT_ALLOWED_TYPES, MediaPolicy};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub max_file_size_mb: u64,
    pub allowed_types: Vec<String>,
    pub cloudinary: CloudinaryConfig,
}

/// Credentials and addressing for the Cloudinary upload API.
///
/// Resolved once at startup and handed to the hosting client; nothing else
/// reads these values.
#[derive(Clone, Default)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
    pub api_base: String,
}

impl CloudinaryConfig {
    pub fn is_configured(&self) -> bool {
        !self.cloud_name.is_empty() && !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

// Keeps the secret out of the startup log line.
impl fmt::Debug for CloudinaryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudinaryConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field(
                "api_secret",
                &if self.api_secret.is_empty() { "" } else { "<redacted>" },
            )
            .field("folder", &self.folder)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Event photo & video upload service")]
pub struct Args {
    /// Host to bind to (overrides EVENT_UPLOAD_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides EVENT_UPLOAD_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Largest accepted upload in MiB (overrides EVENT_UPLOAD_MAX_FILE_SIZE_MB)
    #[arg(long)]
    pub max_file_size_mb: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the upload endpoint (default)
    Serve,
    /// Upload local files to a running endpoint
    Upload(UploadArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct UploadArgs {
    /// Base URL of the upload endpoint
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    pub endpoint: String,

    /// Uploader display name
    #[arg(long)]
    pub name: Option<String>,

    /// Uploader email
    #[arg(long)]
    pub email: Option<String>,

    /// Maximum number of files in one batch
    #[arg(long, default_value_t = 10)]
    pub max_files: usize,

    /// Client-side size ceiling in MiB
    #[arg(long, default_value_t = 50)]
    pub max_file_size_mb: u64,

    /// Seconds the progress view is kept after the batch settles
    #[arg(long, default_value_t = 5)]
    pub clear_after_secs: u64,

    /// Per-request timeout in seconds; unset means no timeout
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Files to upload
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

impl UploadArgs {
    pub fn policy(&self) -> MediaPolicy {
        MediaPolicy::with_defaults(self.max_file_size_mb)
    }

    pub fn clear_after(&self) -> Duration {
        Duration::from_secs(self.clear_after_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the selected command.
    pub fn from_env_and_args() -> Result<(Self, Command)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("EVENT_UPLOAD_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_parse("EVENT_UPLOAD_PORT", 3000u16)?;
        let env_max_size = env_parse("EVENT_UPLOAD_MAX_FILE_SIZE_MB", 100u64)?;
        let allowed_types = match env::var("EVENT_UPLOAD_ALLOWED_TYPES") {
            Ok(value) => parse_type_list(&value),
            Err(_) => DEFAULT_ALLOWED_TYPES.iter().map(|t| t.to_string()).collect(),
        };

        let cloudinary = CloudinaryConfig {
            cloud_name: env::var("CLOUDINARY_CLOUD_NAME").unwrap_or_default(),
            api_key: env::var("CLOUDINARY_API_KEY").unwrap_or_default(),
            api_secret: env::var("CLOUDINARY_API_SECRET").unwrap_or_default(),
            folder: env::var("CLOUDINARY_FOLDER").unwrap_or_else(|_| "memories-app".into()),
            api_base: env::var("CLOUDINARY_API_BASE")
                .unwrap_or_else(|_| "https://api.cloudinary.com".into()),
        };

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            max_file_size_mb: args.max_file_size_mb.unwrap_or(env_max_size),
            allowed_types,
            cloudinary,
        };

        Ok((cfg, args.command.unwrap_or(Command::Serve)))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn policy(&self) -> MediaPolicy {
        MediaPolicy::new(self.allowed_types.clone(), self.max_file_size_mb)
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

/// Split a comma separated MIME list, dropping blanks and normalizing case.
pub fn parse_type_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_list_is_trimmed_and_lowercased() {
        assert_eq!(
            parse_type_list(" image/JPEG, ,video/mp4,"),
            vec!["image/jpeg".to_string(), "video/mp4".to_string()]
        );
    }

    #[test]
    fn upload_subcommand_uses_client_defaults() {
        let args = Args::try_parse_from(["event-upload", "upload", "a.jpg", "b.mp4"])
            .expect("args should parse");
        let Some(Command::Upload(upload)) = args.command else {
            panic!("expected upload command");
        };
        assert_eq!(upload.files.len(), 2);
        assert_eq!(upload.max_files, 10);
        assert_eq!(upload.max_file_size_mb, 50);
        assert_eq!(upload.clear_after(), Duration::from_secs(5));
        assert!(upload.timeout().is_none());
        assert_eq!(upload.policy().max_bytes(), 50 * 1024 * 1024);
    }

    #[test]
    fn upload_requires_at_least_one_file() {
        assert!(Args::try_parse_from(["event-upload", "upload"]).is_err());
    }

    #[test]
    fn debug_output_redacts_secret() {
        let cfg = CloudinaryConfig {
            cloud_name: "demo".into(),
            api_key: "key".into(),
            api_secret: "very-secret".into(),
            folder: "memories-app".into(),
            api_base: "https://api.cloudinary.com".into(),
        };
        let printed = format!("{:?}", cfg);
        assert!(!printed.contains("very-secret"));
        assert!(cfg.is_configured());
        assert!(!CloudinaryConfig::default().is_configured());
    }
}

use crate::error::ConfigurationError;
use crate::util;
use std::env;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

fn default_mongodb_uri() -> String {
    env::var("MONGODB_URI").unwrap_or("mongodb://localhost:27017".to_string())
}

fn default_mongodb_db() -> String {
    env::var("MONGODB_DB_NAME").unwrap_or("lms".to_string())
}

fn default_public_content() -> PathBuf {
    PathBuf::from(env::var("PUBLIC_CONTENT_PATH").unwrap_or("./public".to_string()))
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from(env::var("UPLOAD_DIR").unwrap_or("./uploads".to_string()))
}

fn default_public_url() -> String {
    env::var("PUBLIC_URL").unwrap_or_default()
}

fn default_max_upload_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_password_cost() -> u32 {
    10
}

fn default_token_ttl_hours() -> i64 {
    24
}

fn default_jwt_secret() -> Option<String> {
    env::var("JWT_SECRET").ok().filter(|it| !it.is_empty())
}

#[cfg(debug_assertions)]
fn default_admin_emails() -> Vec<String> {
    vec![String::from("admin@localhost")]
}
#[cfg(not(debug_assertions))]
fn default_admin_emails() -> Vec<String> {
    vec![]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip)]
    file_path: PathBuf,

    #[serde(default = "default_mongodb_uri")]
    pub mongodb_uri: String,
    #[serde(default = "default_mongodb_db")]
    pub mongodb_db: String,

    #[serde(default = "default_public_content")]
    pub public_content: PathBuf,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Prefix for submission file URLs. Empty produces host-relative URLs.
    #[serde(default = "default_public_url")]
    pub public_url: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    #[serde(default = "default_password_cost")]
    pub password_cost: u32,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    #[serde(default = "default_jwt_secret", skip_serializing)]
    pub jwt_secret: Option<String>,

    #[serde(default = "default_admin_emails")]
    pub admin_emails: Vec<String>,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            file_path: config_dir().join("settings.yml"),
            mongodb_uri: default_mongodb_uri(),
            mongodb_db: default_mongodb_db(),
            public_content: default_public_content(),
            upload_dir: default_upload_dir(),
            public_url: default_public_url(),
            max_upload_bytes: default_max_upload_bytes(),
            password_cost: default_password_cost(),
            token_ttl_hours: default_token_ttl_hours(),
            jwt_secret: default_jwt_secret(),
            admin_emails: default_admin_emails(),
            cors_origins: vec![],
        }
    }
}

#[inline]
fn config_dir() -> PathBuf {
    PathBuf::from(env::var("CONFIG_DIR").unwrap_or("./config".to_string()))
}

impl Config {
    pub fn load() -> Result<Config, ConfigurationError> {
        let config_file = util::find_first_subpath(
            config_dir(),
            &["settings.yml", "settings.yaml"],
            Path::exists,
        )
        .ok_or_else(|| ConfigurationError::NotFound(config_dir()))?;

        let file = File::open(&config_file)?;
        let mut config: Config = serde_yaml::from_reader(BufReader::new(file))?;
        config.file_path = config_file;

        Ok(config)
    }

    pub fn save(&self) -> Result<(), ConfigurationError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.file_path)?;
        let mut out = BufWriter::new(file);
        serde_yaml::to_writer(&mut out, self)?;
        out.flush()?;
        Ok(())
    }

    /// Public URL of a file stored in the upload directory.
    pub fn upload_url(&self, file_name: impl AsRef<str>) -> String {
        format!(
            "{}/uploads/{}",
            self.public_url.trim_end_matches('/'),
            file_name.as_ref()
        )
    }
}

use recordkit_store::{AtomicStoreMutationError, Record, RecordKey, RecordStore};
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt::Display;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

pub const CONFIG_FILE_NAME: &str = "recordkit.toml";
pub const LOG_ENV: &str = "RECORDKIT_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";

/// Optional `<data-dir>/recordkit.toml`. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    log: Option<String>,
    files: FileNames,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileNames {
    students: String,
    accounts: String,
    books: String,
    members: String,
    notes: String,
}

impl Default for FileNames {
    fn default() -> Self {
        Self {
            students: "students.jsonl".to_string(),
            accounts: "accounts.jsonl".to_string(),
            books: "books.jsonl".to_string(),
            members: "members.jsonl".to_string(),
            notes: "notes.txt".to_string(),
        }
    }
}

/// Resolved locations of every file the CLI touches.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub students: PathBuf,
    pub accounts: PathBuf,
    pub books: PathBuf,
    pub members: PathBuf,
    pub notes: PathBuf,
    pub log_filter: Option<String>,
}

impl Settings {
    pub fn resolve(data_dir: &str) -> Result<Self, String> {
        let data_dir = PathBuf::from(data_dir);
        let config_path = data_dir.join(CONFIG_FILE_NAME);
        let config = match fs::read_to_string(&config_path) {
            Ok(text) => toml::from_str::<ConfigFile>(&text)
                .map_err(|e| format!("failed to parse {}: {e}", config_path.display()))?,
            Err(err) if err.kind() == ErrorKind::NotFound => ConfigFile::default(),
            Err(err) => return Err(format!("failed to read {}: {err}", config_path.display())),
        };
        let files = config.files;
        Ok(Self {
            students: data_dir.join(files.students),
            accounts: data_dir.join(files.accounts),
            books: data_dir.join(files.books),
            members: data_dir.join(files.members),
            notes: data_dir.join(files.notes),
            log_filter: config.log,
            data_dir,
        })
    }
}

/// Install the stderr subscriber. `RECORDKIT_LOG` wins over the config file.
pub fn init_tracing(configured: Option<&str>) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(configured.unwrap_or(DEFAULT_LOG_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn exit_with(message: impl Display) -> ! {
    tracing::debug!(%message, "command failed");
    eprintln!("error: {message}");
    std::process::exit(1);
}

pub fn print_json(payload: &Value) {
    match serde_json::to_string_pretty(payload) {
        Ok(text) => println!("{text}"),
        Err(err) => exit_with(format!("failed to render JSON: {err}")),
    }
}

pub fn to_json_or_exit<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value)
        .unwrap_or_else(|e| exit_with(format!("failed to render JSON: {e}")))
}

/// Load a snapshot that must already exist.
pub fn load_existing_or_exit<K, R>(path: &Path) -> RecordStore<K, R>
where
    K: RecordKey + Serialize + DeserializeOwned,
    R: Record + Serialize + DeserializeOwned,
{
    if !path.exists() {
        exit_with(format!("snapshot not found: {}", path.display()));
    }
    RecordStore::load_jsonl(path)
        .unwrap_or_else(|e| exit_with(format!("failed to load {}: {e}", path.display())))
}

/// Load a snapshot, treating a missing file as an empty store.
pub fn load_or_empty_or_exit<K, R>(path: &Path) -> RecordStore<K, R>
where
    K: RecordKey + Serialize + DeserializeOwned,
    R: Record + Serialize + DeserializeOwned,
{
    RecordStore::load_jsonl_or_empty(path)
        .unwrap_or_else(|e| exit_with(format!("failed to load {}: {e}", path.display())))
}

pub fn snapshot_ref_or_exit<K, R>(store: &RecordStore<K, R>) -> String
where
    K: RecordKey + Serialize + DeserializeOwned,
    R: Record + Serialize + DeserializeOwned,
{
    store
        .snapshot_ref()
        .unwrap_or_else(|e| exit_with(format!("failed to digest snapshot: {e}")))
}

pub fn mutation_or_exit<T, E: Display>(result: Result<T, AtomicStoreMutationError<E>>) -> T {
    result.unwrap_or_else(|e| exit_with(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "recordkit-settings-{prefix}-{}-{unique}",
            std::process::id()
        ));
        fs::create_dir_all(&path).expect("temp dir should be created");
        path
    }

    #[test]
    fn defaults_without_config_file() {
        let dir = temp_dir("defaults");
        let settings = Settings::resolve(dir.to_str().expect("utf-8 path")).expect("resolve");
        assert_eq!(settings.students, dir.join("students.jsonl"));
        assert_eq!(settings.accounts, dir.join("accounts.jsonl"));
        assert_eq!(settings.books, dir.join("books.jsonl"));
        assert_eq!(settings.members, dir.join("members.jsonl"));
        assert_eq!(settings.notes, dir.join("notes.txt"));
        assert_eq!(settings.log_filter, None);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn config_file_overrides_names_and_log_filter() {
        let dir = temp_dir("config");
        fs::write(
            dir.join(CONFIG_FILE_NAME),
            "log = \"debug\"\n\n[files]\nstudents = \"class-2024.jsonl\"\n",
        )
        .expect("config should write");
        let settings = Settings::resolve(dir.to_str().expect("utf-8 path")).expect("resolve");
        assert_eq!(settings.students, dir.join("class-2024.jsonl"));
        assert_eq!(settings.books, dir.join("books.jsonl"));
        assert_eq!(settings.log_filter.as_deref(), Some("debug"));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn unknown_config_keys_are_rejected() {
        let dir = temp_dir("unknown");
        fs::write(dir.join(CONFIG_FILE_NAME), "colour = \"blue\"\n").expect("config should write");
        let err = Settings::resolve(dir.to_str().expect("utf-8 path")).expect_err("must fail");
        assert!(err.contains(CONFIG_FILE_NAME));
        let _ = fs::remove_dir_all(dir);
    }
}

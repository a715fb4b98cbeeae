//! Command parsing and execution.

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use futures::future::join_all;
use tracing::{info, warn};

use filedrop_core::{ApiError, Config, FileClient};

/// Maximum length accepted for an identity typed at the prompt
const MAX_IDENTITY_LENGTH: usize = 50;

/// Fallback MIME type for unrecognised extensions
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// An API failure the user has already seen, through the notifier or the
/// login prompt. `main` exits non-zero without printing it again.
#[derive(Debug)]
pub struct Reported(pub ApiError);

impl fmt::Display for Reported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for Reported {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

pub const USAGE: &str = "\
Usage: filedrop <command> [args]

Commands:
  login [username]          Sign in
  register [username]       Create an account
  logout                    Sign out and forget the session
  whoami                    Show the signed-in user
  ls [--json]               List your files
  upload <path>...          Upload one or more files
  download <id>... [--out <dir>]
                            Download files (in parallel)
  view <id>                 Write a file to stdout
  rm <id>                   Delete a file
  usage                     Show storage used
  passwd                    Change your password
  delete-account            Delete your account and all files
  help                      Show this message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login(Option<String>),
    Register(Option<String>),
    Logout,
    WhoAmI,
    List { json: bool },
    Upload(Vec<PathBuf>),
    Download { ids: Vec<String>, out: PathBuf },
    View(String),
    Remove(String),
    Usage,
    ChangePassword,
    DeleteAccount,
    Help,
}

impl Command {
    /// Parse the arguments after the program name
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some((name, rest)) = args.split_first() else {
            return Ok(Command::Help);
        };

        let command = match name.as_str() {
            "login" => Command::Login(rest.first().cloned()),
            "register" => Command::Register(rest.first().cloned()),
            "logout" => Command::Logout,
            "whoami" => Command::WhoAmI,
            "ls" | "list" => Command::List {
                json: rest.iter().any(|a| a == "--json"),
            },
            "upload" => {
                if rest.is_empty() {
                    bail!("upload needs at least one file path");
                }
                Command::Upload(rest.iter().map(PathBuf::from).collect())
            }
            "download" => Self::parse_download(rest)?,
            "view" => Command::View(Self::single_id("view", rest)?),
            "rm" | "delete" => Command::Remove(Self::single_id("rm", rest)?),
            "usage" => Command::Usage,
            "passwd" => Command::ChangePassword,
            "delete-account" => Command::DeleteAccount,
            "help" | "--help" | "-h" => Command::Help,
            other => bail!("Unknown command: {}\n\n{}", other, USAGE),
        };
        Ok(command)
    }

    fn single_id(command: &str, rest: &[String]) -> Result<String> {
        match rest {
            [id] => Ok(id.clone()),
            _ => bail!("{} needs exactly one file id", command),
        }
    }

    fn parse_download(rest: &[String]) -> Result<Self> {
        let mut ids = Vec::new();
        let mut out = PathBuf::from(".");
        let mut args = rest.iter();
        while let Some(arg) = args.next() {
            if arg == "--out" {
                out = args
                    .next()
                    .map(PathBuf::from)
                    .context("--out needs a directory")?;
            } else {
                ids.push(arg.clone());
            }
        }
        if ids.is_empty() {
            bail!("download needs at least one file id");
        }
        Ok(Command::Download { ids, out })
    }

    /// Commands that need a signed-in session
    pub fn requires_session(&self) -> bool {
        !matches!(
            self,
            Command::Login(_) | Command::Register(_) | Command::Help | Command::WhoAmI
        )
    }
}

pub async fn run(command: Command, client: &FileClient, config: &mut Config) -> Result<()> {
    match command {
        Command::Help => println!("{}", USAGE),
        Command::Login(identity) => login(client, config, identity).await?,
        Command::Register(identity) => register(client, identity).await?,
        Command::Logout => {
            client.logout().await;
            println!("Logged out.");
        }
        Command::WhoAmI => match client.session().identity() {
            Some(identity) if client.session().is_authenticated() => println!("{}", identity),
            _ => println!("Not logged in."),
        },
        Command::List { json } => {
            let files = client.list_files().await.map_err(Reported)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else if files.is_empty() {
                println!("No files yet.");
            } else {
                for file in &files {
                    let uploaded = file
                        .upload_date
                        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default();
                    let kind = if file.is_video() { "video" } else { "" };
                    println!(
                        "{:<26} {:>10}  {:<16}  {:<5}  {}",
                        file.id,
                        file.display_size(),
                        uploaded,
                        kind,
                        file.filename
                    );
                }
            }
        }
        Command::Upload(paths) => {
            for path in paths {
                let bytes = std::fs::read(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let file_name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .context("Path has no file name")?;
                let message = client
                    .upload(file_name, content_type_for(&path), bytes)
                    .await
                    .map_err(Reported)?;
                println!("{}: {}", file_name, message);
            }
        }
        Command::Download { ids, out } => download_all(client, &ids, &out).await?,
        Command::View(id) => {
            let download = client.view(&id).await.map_err(Reported)?;
            io::stdout().write_all(&download.bytes)?;
        }
        Command::Remove(id) => println!("{}", client.delete_file(&id).await.map_err(Reported)?),
        Command::Usage => {
            let usage = client.storage_usage().await.map_err(Reported)?;
            println!("{}", usage.display());
        }
        Command::ChangePassword => {
            let current = rpassword::prompt_password("Current password: ")?;
            let new = rpassword::prompt_password("New password: ")?;
            let confirm = rpassword::prompt_password("Repeat new password: ")?;
            if new != confirm {
                bail!("Passwords do not match");
            }
            let message = client.change_password(&current, &new).await.map_err(Reported)?;
            println!("{}", message);
        }
        Command::DeleteAccount => {
            let answer = prompt("Type DELETE to remove your account and all files: ")?;
            if answer != "DELETE" {
                println!("Cancelled.");
                return Ok(());
            }
            println!("{}", client.delete_account().await.map_err(Reported)?);
        }
    }
    Ok(())
}

async fn login(client: &FileClient, config: &mut Config, identity: Option<String>) -> Result<()> {
    let identity = match identity.or_else(|| std::env::var("FILEDROP_USERNAME").ok()) {
        Some(identity) => identity,
        None => prompt_identity(config.last_identity.as_deref())?,
    };
    let secret = match std::env::var("FILEDROP_PASSWORD") {
        Ok(secret) => secret,
        Err(_) => rpassword::prompt_password("Password: ")?,
    };

    if let Err(e) = client.login(&identity, &secret).await {
        eprintln!("{}", login_error_message(&e));
        return Err(Reported(e).into());
    }

    config.last_identity = Some(identity.clone());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
    println!("Logged in as {}.", identity);
    Ok(())
}

async fn register(client: &FileClient, identity: Option<String>) -> Result<()> {
    let identity = match identity {
        Some(identity) => identity,
        None => prompt_identity(None)?,
    };
    let secret = rpassword::prompt_password("Password: ")?;
    let confirm = rpassword::prompt_password("Repeat password: ")?;
    if secret != confirm {
        bail!("Passwords do not match");
    }

    if let Err(e) = client.register(&identity, &secret).await {
        eprintln!("Registration failed: {}", e.user_message());
        return Err(Reported(e).into());
    }
    println!("Account created. Run `filedrop login {}` to sign in.", identity);
    Ok(())
}

/// Download several files at once; replays after a refresh are shared.
async fn download_all(client: &FileClient, ids: &[String], out: &Path) -> Result<()> {
    std::fs::create_dir_all(out)
        .with_context(|| format!("Failed to create {}", out.display()))?;

    let results = join_all(ids.iter().map(|id| client.download(id))).await;

    let mut failed = 0;
    for (id, result) in ids.iter().zip(results) {
        match result {
            Ok(download) => {
                let name = download
                    .file_name
                    .as_deref()
                    .and_then(|n| Path::new(n).file_name())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(id));
                let target = out.join(name);
                std::fs::write(&target, &download.bytes)
                    .with_context(|| format!("Failed to write {}", target.display()))?;
                info!(id = %id, path = %target.display(), "Downloaded");
                println!("{} -> {}", id, target.display());
            }
            // Already reported through the notifier
            Err(_) => failed += 1,
        }
    }

    if failed > 0 {
        bail!("{} of {} downloads failed", failed, ids.len());
    }
    Ok(())
}

fn login_error_message(error: &ApiError) -> String {
    match error {
        ApiError::InvalidCredentials(_) => "Invalid username or password".to_string(),
        ApiError::NetworkError(_) => {
            "Unable to connect to server. Check your internet connection.".to_string()
        }
        other => format!("Login failed: {}", other.user_message()),
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_identity(last: Option<&str>) -> Result<String> {
    let input = match last {
        Some(last) => {
            let input = prompt(&format!("Username [{}]: ", last))?;
            if input.is_empty() {
                last.to_string()
            } else {
                input
            }
        }
        None => prompt("Username: ")?,
    };

    if input.is_empty() || input.chars().count() > MAX_IDENTITY_LENGTH {
        bail!("Username must be between 1 and {} characters", MAX_IDENTITY_LENGTH);
    }
    Ok(input)
}

/// Pick a MIME type from the file extension
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        "json" => "application/json",
        "zip" => "application/zip",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_basic_commands() {
        assert_eq!(Command::parse(&[]).unwrap(), Command::Help);
        assert_eq!(Command::parse(&args(&["logout"])).unwrap(), Command::Logout);
        assert_eq!(
            Command::parse(&args(&["login", "alice"])).unwrap(),
            Command::Login(Some("alice".into()))
        );
        assert_eq!(Command::parse(&args(&["login"])).unwrap(), Command::Login(None));
        assert_eq!(
            Command::parse(&args(&["ls", "--json"])).unwrap(),
            Command::List { json: true }
        );
        assert_eq!(
            Command::parse(&args(&["rm", "abc"])).unwrap(),
            Command::Remove("abc".into())
        );
    }

    #[test]
    fn test_parse_download_with_out_dir() {
        assert_eq!(
            Command::parse(&args(&["download", "a", "--out", "/tmp/x", "b"])).unwrap(),
            Command::Download {
                ids: vec!["a".into(), "b".into()],
                out: PathBuf::from("/tmp/x"),
            }
        );
        assert!(Command::parse(&args(&["download"])).is_err());
        assert!(Command::parse(&args(&["download", "a", "--out"])).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Command::parse(&args(&["frobnicate"])).is_err());
        assert!(Command::parse(&args(&["upload"])).is_err());
        assert!(Command::parse(&args(&["rm"])).is_err());
        assert!(Command::parse(&args(&["view", "a", "b"])).is_err());
    }

    #[test]
    fn test_requires_session() {
        assert!(!Command::Login(None).requires_session());
        assert!(!Command::Help.requires_session());
        assert!(Command::List { json: false }.requires_session());
        assert!(Command::Logout.requires_session());
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("clip.MP4")), "video/mp4");
        assert_eq!(content_type_for(Path::new("photo.jpeg")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("README")), DEFAULT_CONTENT_TYPE);
        assert_eq!(content_type_for(Path::new("archive.tar.gz")), DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn test_login_error_message() {
        assert_eq!(
            login_error_message(&ApiError::InvalidCredentials("x".into())),
            "Invalid username or password"
        );
        assert_eq!(
            login_error_message(&ApiError::ServerError { status: 500, message: "boom".into() }),
            "Login failed: boom"
        );
    }
}

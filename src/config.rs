//! Server Configuration
//!
//! Two settings locate the snapshot file loaded at startup. Both are fixed
//! once the server starts and can be read back by clients with
//! `CONFIG GET dir` / `CONFIG GET dbfilename`.

use clap::Parser;
use std::path::PathBuf;

/// Command-line flags.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "snapkv")]
#[command(about = "In-memory key-value server with snapshot recovery")]
#[command(version)]
pub struct Args {
    /// Directory holding the snapshot file
    #[arg(long, default_value = "")]
    pub dir: String,

    /// Snapshot file name inside `--dir`
    #[arg(long, default_value = "")]
    pub dbfilename: String,
}

/// Immutable process-wide configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerConfig {
    pub dir: String,
    pub dbfilename: String,
}

impl ServerConfig {
    pub fn new(dir: impl Into<String>, dbfilename: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            dbfilename: dbfilename.into(),
        }
    }

    /// Looks up a parameter by name, as `CONFIG GET` does.
    ///
    /// Names are matched case-insensitively. Unknown names yield `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        match name.to_ascii_lowercase().as_str() {
            "dir" => Some(&self.dir),
            "dbfilename" => Some(&self.dbfilename),
            _ => None,
        }
    }

    /// Full path of the snapshot file, or `None` when no file name is set.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        if self.dbfilename.is_empty() {
            return None;
        }
        Some(PathBuf::from(&self.dir).join(&self.dbfilename))
    }
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self::new(args.dir, args.dbfilename)
    }
}

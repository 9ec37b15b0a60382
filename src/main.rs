//! gcs-vfs command-line entry point

use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use gcs_vfs::config::Config;
use gcs_vfs::fs::{FileInfo, Fs};
use gcs_vfs::walk::walk_with_separator;
use gcs_vfs::GcsFs;

const COPY_CHUNK: usize = 256 * 1024;

/// Print usage information
fn print_usage() {
    eprintln!("Usage: gcs-vfs <config.yaml> <command> [args]");
    eprintln!();
    eprintln!("gcs-vfs - Google Cloud Storage as a virtual filesystem");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  ls <path>                List a directory");
    eprintln!("  tree <path>              List a directory recursively");
    eprintln!("  stat <path>              Show metadata");
    eprintln!("  cat <path>               Print a file to stdout");
    eprintln!("  put <local> <remote>     Upload a local file");
    eprintln!("  get <remote> <local>     Download to a local file");
    eprintln!("  mkdir [-p] <path>        Create a directory");
    eprintln!("  rm [-r] <path>           Remove a file or directory");
    eprintln!("  mv <from> <to>           Rename (copy + delete, not atomic)");
    eprintln!();
    eprintln!("Paths start with the bucket: /my-bucket/dir/file.txt");
    eprintln!("GOOGLE_APPLICATION_CREDENTIALS_JSON may hold service account JSON.");
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Ls(String),
    Tree(String),
    Stat(String),
    Cat(String),
    Put { local: PathBuf, remote: String },
    Get { remote: String, local: PathBuf },
    Mkdir { path: String, parents: bool },
    Rm { path: String, recursive: bool },
    Mv { from: String, to: String },
}

impl Command {
    fn parse(args: &[String]) -> Option<Self> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        match args.as_slice() {
            ["ls", path] => Some(Command::Ls(path.to_string())),
            ["tree", path] => Some(Command::Tree(path.to_string())),
            ["stat", path] => Some(Command::Stat(path.to_string())),
            ["cat", path] => Some(Command::Cat(path.to_string())),
            ["put", local, remote] => Some(Command::Put {
                local: PathBuf::from(local),
                remote: remote.to_string(),
            }),
            ["get", remote, local] => Some(Command::Get {
                remote: remote.to_string(),
                local: PathBuf::from(local),
            }),
            ["mkdir", path] => Some(Command::Mkdir {
                path: path.to_string(),
                parents: false,
            }),
            ["mkdir", "-p", path] => Some(Command::Mkdir {
                path: path.to_string(),
                parents: true,
            }),
            ["rm", path] => Some(Command::Rm {
                path: path.to_string(),
                recursive: false,
            }),
            ["rm", "-r", path] => Some(Command::Rm {
                path: path.to_string(),
                recursive: true,
            }),
            ["mv", from, to] => Some(Command::Mv {
                from: from.to_string(),
                to: to.to_string(),
            }),
            _ => None,
        }
    }

    fn mutates(&self) -> bool {
        matches!(
            self,
            Command::Put { .. } | Command::Mkdir { .. } | Command::Rm { .. } | Command::Mv { .. }
        )
    }
}

fn format_time(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn format_entry(info: &FileInfo) -> String {
    format!(
        "{}{:o}  {:>12}  {}  {}",
        if info.is_dir() { 'd' } else { '-' },
        info.mode_or_default(),
        info.size,
        format_time(info.mtime),
        info.name
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        print_usage();
        std::process::exit(1);
    }

    let config_path = PathBuf::from(&args[1]);
    let command = match Command::parse(&args[2..]) {
        Some(c) => c,
        None => {
            print_usage();
            std::process::exit(1);
        }
    };

    // Load configuration
    let config = match Config::from_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!("Loaded configuration from {:?}", config_path);
    debug!("{:?}", config.gcs);

    if config.gcs.read_only && command.mutates() {
        eprintln!("Refusing {:?}: configuration is read-only", command);
        std::process::exit(1);
    }

    let fs = GcsFs::new_with_separator(&config.gcs.separator, config.gcs.client_options()).await?;

    if let Err(e) = run(&fs, &config.gcs.separator, command).await {
        eprintln!("gcs-vfs: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(
    fs: &GcsFs,
    separator: &str,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = tokio::io::stdout();

    match command {
        Command::Ls(path) => {
            let mut dir = fs.open(&path).await?;
            let entries = dir.read_dir(None).await;
            dir.close().await?;
            for entry in entries? {
                stdout
                    .write_all(format!("{}\n", format_entry(&entry)).as_bytes())
                    .await?;
            }
        }
        Command::Tree(path) => {
            let mut entries = walk_with_separator(fs, &path, separator);
            while let Some((path, info)) = entries.try_next().await? {
                let suffix = if info.is_dir() { separator } else { "" };
                stdout
                    .write_all(format!("{}{}\n", path, suffix).as_bytes())
                    .await?;
            }
        }
        Command::Stat(path) => {
            let info = fs.stat(&path).await?;
            let kind = if info.is_dir() { "directory" } else { "file" };
            stdout
                .write_all(
                    format!(
                        "name: {}\ntype: {}\nsize: {}\nmode: {:o}\nmodified: {}\n",
                        info.name,
                        kind,
                        info.size,
                        info.mode_or_default(),
                        format_time(info.mtime)
                    )
                    .as_bytes(),
                )
                .await?;
        }
        Command::Cat(path) => {
            let mut file = fs.open(&path).await?;
            let mut buf = vec![0u8; COPY_CHUNK];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                stdout.write_all(&buf[..n]).await?;
            }
            file.close().await?;
        }
        Command::Put { local, remote } => {
            let mut source = tokio::fs::File::open(&local).await?;
            let mut target = fs.create(&remote).await?;
            let mut buf = vec![0u8; COPY_CHUNK];
            let mut total = 0usize;
            loop {
                let n = source.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                target.write_all(&buf[..n]).await?;
                total += n;
            }
            target.close().await?;
            info!("Uploaded {} bytes from {:?} to {}", total, local, remote);
        }
        Command::Get { remote, local } => {
            let mut source = fs.open(&remote).await?;
            let mut target = tokio::fs::File::create(&local).await?;
            let mut buf = vec![0u8; COPY_CHUNK];
            let mut total = 0usize;
            loop {
                let n = source.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                target.write_all(&buf[..n]).await?;
                total += n;
            }
            target.flush().await?;
            source.close().await?;
            info!("Downloaded {} bytes from {} to {:?}", total, remote, local);
        }
        Command::Mkdir { path, parents } => {
            if parents {
                fs.mkdir_all(&path, gcs_vfs::fs::DEFAULT_DIR_MODE).await?;
            } else {
                fs.mkdir(&path, gcs_vfs::fs::DEFAULT_DIR_MODE).await?;
            }
        }
        Command::Rm { path, recursive } => {
            if recursive {
                fs.remove_all(&path).await?;
            } else {
                fs.remove(&path).await?;
            }
        }
        Command::Mv { from, to } => {
            fs.rename(&from, &to).await?;
        }
    }

    stdout.flush().await?;
    Ok(())
}

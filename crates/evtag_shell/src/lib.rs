//! Command interpreter replaying storage operations against an event-tagging stack.
//!
//! One command per line, parsed as a subcommand:
//!
//! ```text
//! put <path> <text>... [--force]
//! get <path>
//! create <path>
//! write <path> <text>...
//! stream-write <path> <text>... [--offset N] [--no-trunc]
//! stream-read <path> [--offset N] [--count N]
//! truncate <path> <size>
//! mv <from> <to>
//! cp <from> <to>
//! reg <path> <text>...
//! repl <path> <resource>
//! chksum <path>
//! rm <path>
//! meta-ls <path>
//! ls
//! ```
//!
//! Lines are split with shell quoting rules, so `put f "a  b"` keeps both spaces. Text
//! starting with `-` goes after a `--` separator: `write f -- -1 degrees`. Relative paths
//! are resolved against the home collection. Blank lines and lines starting with `#` are
//! ignored.

use std::io::Write;

use clap::{Parser, Subcommand, error::ErrorKind};
use evtag_core::event_handler::{
    EventHandlerDefaultStack, InspectApiDefaultStack,
    api::{InspectRequest, InspectResponse, StorageRequest, StorageResponse},
    infrastructure::{config::ServerConfig, naming::ObjectPath},
    init_event_handler,
    services::chain::ChainBuildReport,
};
use tower::{Service, ServiceExt};
use tracing::debug;

/// Home collection relative paths are resolved against.
pub const DEFAULT_HOME: &str = "/tempZone/home/rods";

#[derive(Parser, Debug, PartialEq)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct Line {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum ShellCommand {
    /// Upload an object
    Put {
        path: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        /// Overwrite an existing object
        #[arg(short, long)]
        force: bool,
    },
    /// Download an object
    Get { path: String },
    /// Create an empty object
    Create { path: String },
    /// Replace the content of an existing object
    Write {
        path: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Write through a stream, creating the object when missing
    StreamWrite {
        path: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        #[arg(long)]
        offset: Option<u64>,
        /// Keep the bytes following the written range
        #[arg(long)]
        no_trunc: bool,
    },
    /// Read through a stream
    StreamRead {
        path: String,
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long)]
        count: Option<u64>,
    },
    /// Set the size of an object
    Truncate { path: String, size: u64 },
    /// Move an object
    Mv { from: String, to: String },
    /// Copy an object
    Cp { from: String, to: String },
    /// Register content as a new object
    Reg {
        path: String,
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Replicate an object to another resource
    Repl { path: String, resource: String },
    /// Compute the checksum of an object
    Chksum { path: String },
    /// Remove an object
    Rm { path: String },
    /// List the metadata of an object
    MetaLs { path: String },
    /// List objects
    Ls,
}

impl ShellCommand {
    /// Parses one script line. Blank lines and comments yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, clap::Error> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }
        let words = shlex::split(line)
            .ok_or_else(|| clap::Error::raw(ErrorKind::InvalidValue, "unbalanced quotes\n"))?;
        Line::try_parse_from(words).map(|line| Some(line.command))
    }
}

/// Storage and inspect services of one stack, plus the home collection.
#[derive(Debug, Clone)]
pub struct Shell {
    storage: EventHandlerDefaultStack,
    inspect: InspectApiDefaultStack,
    home: String,
}

impl Shell {
    pub fn new(config: &ServerConfig, home: &str, resource: &str) -> (Self, ChainBuildReport) {
        let (storage, inspect, report) = init_event_handler(config, resource);
        (Self { storage, inspect, home: home.to_string() }, report)
    }

    fn path(&self, name: &str) -> anyhow::Result<ObjectPath> {
        Ok(ObjectPath::resolve(&self.home, name)?)
    }

    async fn call_storage(&mut self, request: StorageRequest) -> anyhow::Result<StorageResponse> {
        Ok(self.storage.ready().await?.call(request).await?)
    }

    /// Executes a command and returns what it prints.
    pub async fn execute(&mut self, command: ShellCommand) -> anyhow::Result<String> {
        let request = match command {
            ShellCommand::Put { path, text, force } => StorageRequest::Put {
                path: self.path(&path)?,
                data: text.join(" ").into_bytes(),
                force,
            },
            ShellCommand::Get { path } => StorageRequest::Get(self.path(&path)?),
            ShellCommand::Create { path } => StorageRequest::Create(self.path(&path)?),
            ShellCommand::Write { path, text } => {
                StorageRequest::Write { path: self.path(&path)?, data: text.join(" ").into_bytes() }
            }
            ShellCommand::StreamWrite { path, text, offset, no_trunc } => {
                StorageRequest::StreamWrite {
                    path: self.path(&path)?,
                    data: text.join(" ").into_bytes(),
                    offset,
                    truncate: !no_trunc,
                }
            }
            ShellCommand::StreamRead { path, offset, count } => {
                StorageRequest::StreamRead { path: self.path(&path)?, offset, count }
            }
            ShellCommand::Truncate { path, size } => {
                StorageRequest::Truncate { path: self.path(&path)?, size }
            }
            ShellCommand::Mv { from, to } => {
                StorageRequest::Rename { from: self.path(&from)?, to: self.path(&to)? }
            }
            ShellCommand::Cp { from, to } => {
                StorageRequest::Copy { from: self.path(&from)?, to: self.path(&to)? }
            }
            ShellCommand::Reg { path, text } => StorageRequest::Register {
                path: self.path(&path)?,
                data: text.join(" ").into_bytes(),
            },
            ShellCommand::Repl { path, resource } => {
                StorageRequest::Replicate { path: self.path(&path)?, resource }
            }
            ShellCommand::Chksum { path } => StorageRequest::Checksum(self.path(&path)?),
            ShellCommand::Rm { path } => StorageRequest::Remove(self.path(&path)?),
            ShellCommand::MetaLs { path } => {
                let path = self.path(&path)?;
                let request = InspectRequest::ListMetadata(path);
                return match self.inspect.ready().await?.call(request).await? {
                    InspectResponse::Metadata(avus) => Ok(avus
                        .iter()
                        .map(|avu| match avu.unit.as_str() {
                            "" => format!("{}: {}", avu.attribute, avu.value),
                            unit => format!("{}: {} [{}]", avu.attribute, avu.value, unit),
                        })
                        .collect::<Vec<_>>()
                        .join("\n")),
                    other => Err(anyhow::anyhow!("Unexpected inspect response: {other:?}")),
                };
            }
            ShellCommand::Ls => StorageRequest::List,
        };

        let target = match &request {
            StorageRequest::Rename { to, .. } | StorageRequest::Copy { to, .. } => to.to_string(),
            request => request.path().map(ToString::to_string).unwrap_or_default(),
        };
        match self.call_storage(request).await? {
            StorageResponse::Ack => Ok(format!("✓ {target}")),
            StorageResponse::Data(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
            StorageResponse::Checksum(checksum) => Ok(checksum),
            StorageResponse::Paths(paths) => {
                Ok(paths.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n"))
            }
            StorageResponse::Stat(stat) => Ok(format!("{stat:?}")),
        }
    }

    /// Runs every line, writing results to `out` and failures to `err`.
    ///
    /// Returns the number of failed lines; execution continues past failures.
    pub async fn run<O: Write, E: Write>(
        &mut self,
        lines: impl IntoIterator<Item = String>,
        out: &mut O,
        err: &mut E,
    ) -> std::io::Result<usize> {
        let mut failures = 0;
        for (line_num, line) in lines.into_iter().enumerate() {
            let command = match ShellCommand::parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                    ) =>
                {
                    write!(out, "{}", e.render())?;
                    continue;
                }
                Err(e) => {
                    failures += 1;
                    let message = e.render().to_string();
                    writeln!(err, "✗ [{}] Parse error: {}", line_num + 1, message.trim_end())?;
                    continue;
                }
            };
            debug!("[{}] {:?}", line_num + 1, command);
            match self.execute(command).await {
                Ok(output) if output.is_empty() => {}
                Ok(output) => writeln!(out, "{output}")?,
                Err(e) => {
                    failures += 1;
                    writeln!(err, "✗ [{}] {}", line_num + 1, e)?;
                }
            }
        }
        Ok(failures)
    }
}

use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use clap::Parser;

#[derive(Parser, Debug)]
pub struct Args {
    /// Whether woodle's clients connect to it over https.
    /// If so, the sessionid cookie is sent as a secure cookie.
    #[arg(short, long)]
    secure: bool,

    /// The address woodle should listen on. By default
    /// woodle will listen just on the IPv4 loopback.
    #[arg(short, long)]
    address: Option<String>,

    /// The port woodle listens on.
    #[arg(short, long, default_value_t = 12345)]
    port: u16,

    /// Directory holding woodle.sqlite, created if missing.
    #[arg(short, long, default_value = ".")]
    data_dir: PathBuf,

    /// SQL script run before serving, e.g. to wipe and recreate the tables.
    #[arg(long)]
    init_script: Option<PathBuf>,

    /// SQL script run before serving (after any init script), e.g. to
    /// load classes and grades.
    #[arg(long)]
    populate_script: Option<PathBuf>,
}

impl Args {
    pub fn addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.address
            .as_deref()
            .unwrap_or("127.0.0.1")
            .parse()
            .map(|addr: IpAddr| (addr, self.port).into())
    }

    pub fn secure(&self) -> bool {
        self.secure
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Init script, then populate script, whichever were given.
    pub fn scripts(&self) -> impl Iterator<Item = &Path> {
        [&self.init_script, &self.populate_script]
            .into_iter()
            .flatten()
            .map(PathBuf::as_path)
    }
}

//! FTP implementation of the transfer traits.

use super::{Connector, RemoteSession};
use crate::utils::errors::{BackupError, Result};
use std::io::Read;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use tracing::debug;

pub const DEFAULT_PORT: u16 = 21;

impl From<FtpError> for BackupError {
    fn from(e: FtpError) -> Self {
        BackupError::Transfer(e.to_string())
    }
}

/// Opens plain FTP control connections to one host.
#[derive(Debug, Clone)]
pub struct FtpConnector {
    host: String,
    port: u16,
}

impl FtpConnector {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Connector for FtpConnector {
    type Session = FtpSession;

    fn connect(&self) -> Result<FtpSession> {
        debug!(host = %self.host, port = self.port, "Opening FTP connection");
        let stream = FtpStream::connect((self.host.as_str(), self.port))?;
        Ok(FtpSession { stream })
    }
}

pub struct FtpSession {
    stream: FtpStream,
}

impl RemoteSession for FtpSession {
    fn login(&mut self, user: &str, pass: &str) -> Result<()> {
        Ok(self.stream.login(user, pass)?)
    }

    fn cwd(&mut self, path: &str) -> Result<()> {
        Ok(self.stream.cwd(path)?)
    }

    fn pwd(&mut self) -> Result<String> {
        Ok(self.stream.pwd()?)
    }

    fn mkdir(&mut self, path: &str) -> Result<()> {
        Ok(self.stream.mkdir(path)?)
    }

    fn put(&mut self, name: &str, mut reader: &mut dyn Read) -> Result<u64> {
        self.stream.transfer_type(FileType::Binary)?;
        Ok(self.stream.put_file(name, &mut reader)?)
    }

    fn list(&mut self) -> Result<Vec<String>> {
        Ok(self.stream.nlst(None)?)
    }

    fn delete(&mut self, name: &str) -> Result<()> {
        Ok(self.stream.rm(name)?)
    }

    fn quit(&mut self) -> Result<()> {
        debug!("Closing FTP connection");
        Ok(self.stream.quit()?)
    }
}

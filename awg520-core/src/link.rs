use derive_more::Display;
use thiserror::Error;

use crate::scpi::Command;

/// An error produced by the link.
#[derive(Error, Debug, Display, PartialEq, Eq, Clone)]
#[display("{}", msg)]
pub struct LinkError {
    msg: String,
}

impl LinkError {
    /// A new error with the given message.
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }

    /// The error returned by operations on a link that is not open.
    #[must_use]
    pub fn closed() -> Self {
        Self::new("Link is closed")
    }
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// A trait that provides the interface with the instrument.
///
/// One link covers both instrument ports: commands and queries go over the
/// SCPI control connection, [`send_file`](Link::send_file) goes over the
/// file-transfer connection.
pub trait Link: Send {
    /// Opens the link.
    fn open(&mut self) -> Result<(), LinkError>;

    /// Closes the link.
    fn close(&mut self) -> Result<(), LinkError>;

    /// Sends a command that produces no response.
    fn send(&mut self, command: &Command) -> Result<(), LinkError>;

    /// Sends a query and returns the instrument's response line, without its
    /// line terminator.
    fn query(&mut self, command: &Command) -> Result<String, LinkError>;

    /// Places `contents` on the instrument's mass storage under `name`,
    /// replacing any existing file.
    fn send_file(&mut self, name: &str, contents: &[u8]) -> Result<(), LinkError>;

    /// Checks if the link is open.
    #[must_use]
    fn is_open(&self) -> bool;

    /// Errors unless the link is open.
    fn ensure_is_open(&self) -> Result<(), LinkError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(LinkError::closed())
        }
    }
}

impl Link for Box<dyn Link> {
    fn open(&mut self) -> Result<(), LinkError> {
        self.as_mut().open()
    }

    fn close(&mut self) -> Result<(), LinkError> {
        self.as_mut().close()
    }

    fn send(&mut self, command: &Command) -> Result<(), LinkError> {
        self.as_mut().send(command)
    }

    fn query(&mut self, command: &Command) -> Result<String, LinkError> {
        self.as_mut().query(command)
    }

    fn send_file(&mut self, name: &str, contents: &[u8]) -> Result<(), LinkError> {
        self.as_mut().send_file(name, contents)
    }

    fn is_open(&self) -> bool {
        self.as_ref().is_open()
    }
}

//! The real transport: SCPI over a TCP socket, file transfer over the
//! instrument's FTP server. The FTP side is the handful of verbs the
//! instrument supports (binary type, passive mode, `STOR`), spoken directly
//! over [`std::net`].

use core::time::Duration;
use std::io::{BufRead, BufReader, Write};
use std::net::{IpAddr, Ipv4Addr, Shutdown, SocketAddr, TcpStream};

use awg520_core::defined::{FTP_PORT, SCPI_PORT};
use awg520_core::link::{Link, LinkError};
use awg520_core::scpi::Command;

/// Configuration of a [`TcpLink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TcpLinkOption {
    /// Port of the SCPI control connection.
    pub scpi_port: u16,
    /// Port of the FTP control connection.
    pub ftp_port: u16,
    /// Connect, read and write timeout of every socket.
    pub timeout: Duration,
}

impl Default for TcpLinkOption {
    fn default() -> Self {
        Self {
            scpi_port: SCPI_PORT,
            ftp_port: FTP_PORT,
            timeout: Duration::from_secs(5),
        }
    }
}

/// A link to an AWG520 over its ethernet interface.
pub struct TcpLink {
    addr: IpAddr,
    option: TcpLinkOption,
    scpi: Option<BufReader<TcpStream>>,
    ftp: Option<BufReader<TcpStream>>,
}

impl TcpLink {
    /// A closed link to the instrument at `addr`, with default ports and
    /// timeouts.
    #[must_use]
    pub fn new(addr: IpAddr) -> Self {
        Self::with_option(addr, TcpLinkOption::default())
    }

    /// A closed link to the instrument at `addr`.
    #[must_use]
    pub const fn with_option(addr: IpAddr, option: TcpLinkOption) -> Self {
        Self {
            addr,
            option,
            scpi: None,
            ftp: None,
        }
    }

    fn connect(&self, port: u16) -> Result<BufReader<TcpStream>, LinkError> {
        let stream =
            TcpStream::connect_timeout(&SocketAddr::new(self.addr, port), self.option.timeout)?;
        stream.set_read_timeout(Some(self.option.timeout))?;
        stream.set_write_timeout(Some(self.option.timeout))?;
        Ok(BufReader::new(stream))
    }
}

impl Link for TcpLink {
    fn open(&mut self) -> Result<(), LinkError> {
        let scpi = self.connect(self.option.scpi_port)?;
        let mut ftp = self.connect(self.option.ftp_port)?;
        ftp_expect(&mut ftp, &[220])?;
        let (code, _) = ftp_command(&mut ftp, "USER anonymous", &[331, 230])?;
        if code == 331 {
            ftp_command(&mut ftp, "PASS awg520", &[230])?;
        }
        ftp_command(&mut ftp, "TYPE I", &[200])?;
        self.scpi = Some(scpi);
        self.ftp = Some(ftp);
        tracing::info!("Connected to instrument at {}", self.addr);
        Ok(())
    }

    fn close(&mut self) -> Result<(), LinkError> {
        let quit = match self.ftp.take() {
            Some(mut ftp) => ftp_command(&mut ftp, "QUIT", &[221]).map(|_| ()),
            None => Ok(()),
        };
        self.scpi = None;
        quit
    }

    fn send(&mut self, command: &Command) -> Result<(), LinkError> {
        let scpi = self.scpi.as_mut().ok_or_else(LinkError::closed)?;
        tracing::trace!(%command, "SCPI send");
        scpi.get_mut().write_all(format!("{command}\n").as_bytes())?;
        Ok(())
    }

    fn query(&mut self, command: &Command) -> Result<String, LinkError> {
        let scpi = self.scpi.as_mut().ok_or_else(LinkError::closed)?;
        tracing::trace!(%command, "SCPI query");
        scpi.get_mut().write_all(format!("{command}\n").as_bytes())?;
        let mut reply = String::new();
        if scpi.read_line(&mut reply)? == 0 {
            return Err(LinkError::new("SCPI connection closed by the instrument"));
        }
        Ok(reply.trim_end_matches(['\r', '\n']).to_owned())
    }

    fn send_file(&mut self, name: &str, contents: &[u8]) -> Result<(), LinkError> {
        let timeout = self.option.timeout;
        let ftp = self.ftp.as_mut().ok_or_else(LinkError::closed)?;
        let (_, reply) = ftp_command(ftp, "PASV", &[227])?;
        let data_addr = parse_pasv(&reply)
            .ok_or_else(|| LinkError::new(format!("Malformed PASV reply: {reply:?}")))?;
        let mut data = TcpStream::connect_timeout(&data_addr, timeout)?;
        data.set_write_timeout(Some(timeout))?;
        ftp_command(ftp, &format!("STOR {name}"), &[125, 150])?;
        data.write_all(contents)?;
        data.shutdown(Shutdown::Write)?;
        drop(data);
        ftp_expect(ftp, &[226])?;
        tracing::debug!(name, bytes = contents.len(), "FTP transfer complete");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.scpi.is_some() && self.ftp.is_some()
    }
}

/// Splits an FTP reply line of the final form `NNN text` (or just `NNN`)
/// into code and text. Returns `None` for continuation lines of a multiline
/// reply.
fn parse_reply(line: &str) -> Option<(u16, &str)> {
    let code = line.get(..3)?.parse().ok()?;
    match line.as_bytes().get(3) {
        None => Some((code, "")),
        Some(b' ') => Some((code, &line[4..])),
        Some(_) => None,
    }
}

/// Reads FTP reply lines until the final line of the reply, and checks its
/// code against `expected`.
fn ftp_expect(
    ftp: &mut BufReader<TcpStream>,
    expected: &[u16],
) -> Result<(u16, String), LinkError> {
    loop {
        let mut line = String::new();
        if ftp.read_line(&mut line)? == 0 {
            return Err(LinkError::new("FTP connection closed by the instrument"));
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if let Some((code, text)) = parse_reply(line) {
            if !expected.contains(&code) {
                return Err(LinkError::new(format!("Unexpected FTP reply: {line:?}")));
            }
            return Ok((code, text.to_owned()));
        }
    }
}

fn ftp_command(
    ftp: &mut BufReader<TcpStream>,
    command: &str,
    expected: &[u16],
) -> Result<(u16, String), LinkError> {
    tracing::trace!(command, "FTP send");
    ftp.get_mut().write_all(format!("{command}\r\n").as_bytes())?;
    ftp_expect(ftp, expected)
}

/// Extracts the data-connection address from a `227 Entering Passive Mode
/// (h1,h2,h3,h4,p1,p2)` reply text.
fn parse_pasv(text: &str) -> Option<SocketAddr> {
    let inner = text.split_once('(')?.1.split_once(')')?.0;
    let fields = inner
        .split(',')
        .map(|field| field.trim().parse::<u8>())
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    let [h1, h2, h3, h4, p1, p2] = fields[..] else {
        return None;
    };
    Some(SocketAddr::new(
        IpAddr::V4(Ipv4Addr::new(h1, h2, h3, h4)),
        u16::from(p1) << 8 | u16::from(p2),
    ))
}

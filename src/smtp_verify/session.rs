use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::Instant;

use super::error::SessionError;
use super::types::{AttemptStage, SmtpReply};

/// RFC 5321 caps reply lines at 512 octets; hostile servers get some slack
/// but not an unbounded buffer.
const MAX_LINE_LEN: u64 = 4096;
const MAX_REPLY_LINES: usize = 64;

/// Line-oriented SMTP client session. Dropping it closes the connection.
pub(crate) struct SmtpSession<S> {
    stream: BufReader<S>,
    command_timeout: Duration,
}

impl SmtpSession<TcpStream> {
    /// Resolve `host` and connect to the first address that accepts.
    ///
    /// Addresses are tried in order, each within an equal share of the time
    /// left before `deadline`, so a blackholed first address cannot eat the
    /// whole budget. The caller still bounds the lookup itself.
    pub(crate) async fn connect(
        host: &str,
        port: u16,
        deadline: Instant,
        command_timeout: Duration,
    ) -> Result<(Self, SocketAddr), SessionError> {
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
            .await
            .map_err(|source| SessionError::Resolve {
                host: host.to_string(),
                source,
            })?
            .collect();

        let mut last_err = None;
        for (tried, addr) in addrs.iter().copied().enumerate() {
            let share = attempt_budget(deadline, Instant::now(), addrs.len() - tried);
            match tokio::time::timeout(share, TcpStream::connect(addr)).await {
                Ok(Ok(stream)) => return Ok((Self::new(stream, command_timeout), addr)),
                Ok(Err(source)) => last_err = Some(SessionError::Connect { addr, source }),
                Err(_) => {
                    last_err = Some(SessionError::Timeout {
                        stage: AttemptStage::Connect,
                        after: share,
                    })
                }
            }
        }
        Err(last_err.unwrap_or_else(|| SessionError::NoAddress {
            host: host.to_string(),
        }))
    }
}

/// Equal share of the time left for each of the `remaining` addresses.
fn attempt_budget(deadline: Instant, now: Instant, remaining: usize) -> Duration {
    let left = deadline.saturating_duration_since(now);
    let remaining = u32::try_from(remaining.max(1)).unwrap_or(u32::MAX);
    left / remaining
}

impl<S> SmtpSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(stream: S, command_timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            command_timeout,
        }
    }

    pub(crate) async fn send_command(
        &mut self,
        command: &str,
        stage: AttemptStage,
    ) -> Result<(), SessionError> {
        let mut line = Vec::with_capacity(command.len() + 2);
        line.extend_from_slice(command.as_bytes());
        line.extend_from_slice(b"\r\n");

        let after = self.command_timeout;
        let stream = self.stream.get_mut();
        tokio::time::timeout(after, async {
            stream.write_all(&line).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| SessionError::Timeout { stage, after })??;
        Ok(())
    }

    pub(crate) async fn read_reply(&mut self, stage: AttemptStage) -> Result<SmtpReply, SessionError> {
        let after = self.command_timeout;
        tokio::time::timeout(after, self.read_reply_inner())
            .await
            .map_err(|_| SessionError::Timeout { stage, after })?
    }

    async fn read_reply_inner(&mut self) -> Result<SmtpReply, SessionError> {
        let mut code: Option<u16> = None;
        let mut lines = Vec::new();
        loop {
            if lines.len() == MAX_REPLY_LINES {
                return Err(SessionError::protocol(format!(
                    "reply longer than {MAX_REPLY_LINES} lines"
                )));
            }
            let raw = self.read_line().await?;
            let (parsed_code, continuation, text) = parse_reply_line(&raw)?;
            match code {
                Some(existing) if existing != parsed_code => {
                    return Err(SessionError::protocol(format!(
                        "inconsistent reply codes: {existing} vs {parsed_code}"
                    )));
                }
                Some(_) => {}
                None => code = Some(parsed_code),
            }
            lines.push(text.to_string());
            if !continuation {
                return Ok(SmtpReply {
                    code: parsed_code,
                    message: lines.join("\n"),
                });
            }
        }
    }

    async fn read_line(&mut self) -> Result<String, SessionError> {
        let mut buf = Vec::new();
        let read = (&mut self.stream)
            .take(MAX_LINE_LEN)
            .read_until(b'\n', &mut buf)
            .await?;
        if read == 0 {
            return Err(SessionError::Closed);
        }
        if buf.last() != Some(&b'\n') {
            if read as u64 >= MAX_LINE_LEN {
                return Err(SessionError::protocol("reply line too long"));
            }
            return Err(SessionError::Closed);
        }
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

/// Split `250-text` / `250 text` into code, continuation flag and text.
fn parse_reply_line(line: &str) -> Result<(u16, bool, &str), SessionError> {
    let digits = line
        .get(..3)
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| SessionError::protocol(format!("invalid reply: '{line}'")))?;
    if !matches!(digits.as_bytes()[0], b'2'..=b'5') {
        return Err(SessionError::protocol(format!("invalid reply code: '{digits}'")));
    }
    let code = digits
        .parse::<u16>()
        .map_err(|_| SessionError::protocol(format!("invalid reply code: '{digits}'")))?;
    let continuation = line.as_bytes().get(3) == Some(&b'-');
    let text = line.get(4..).unwrap_or("");
    Ok((code, continuation, text))
}

use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tracing::debug;

use crate::smtp_verify::error::SessionError;
use crate::smtp_verify::options::ProbeOptions;
use crate::smtp_verify::session::SmtpSession;
use crate::smtp_verify::types::{AttemptStage, ProbeOutcome, ServerAttempt, SmtpEvent, SmtpReply};
use crate::validator::EmailAddress;

/// Probes one mail exchanger for one recipient.
///
/// Implementations must always return; connection problems are reported as
/// [`ProbeOutcome::Unreachable`], never as a panic or an error.
pub trait HostProber: Send + Sync {
    fn probe(
        &self,
        host: &str,
        recipient: &EmailAddress,
    ) -> impl Future<Output = ServerAttempt> + Send;
}

/// [`HostProber`] speaking SMTP over TCP: greeting, `EHLO` (or `HELO`),
/// `MAIL FROM`, `RCPT TO`, `QUIT`. No message is ever sent.
///
/// The verdict is a heuristic. Catch-all servers accept every `RCPT TO` and
/// bounce later (false positives); servers that block probing addresses or
/// greylist answer with errors for mailboxes that exist (false negatives).
#[derive(Debug, Clone, Default)]
pub struct SmtpProber {
    options: ProbeOptions,
}

impl SmtpProber {
    pub fn new(options: ProbeOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ProbeOptions {
        &self.options
    }
}

impl HostProber for SmtpProber {
    async fn probe(&self, host: &str, recipient: &EmailAddress) -> ServerAttempt {
        let mut attempt = ServerAttempt::new(
            host,
            ProbeOutcome::unreachable(AttemptStage::Connect, "probe not attempted"),
        );
        let deadline = Instant::now() + self.options.connect_timeout;

        let connected = tokio::time::timeout_at(
            deadline,
            SmtpSession::connect(host, self.options.port, deadline, self.options.command_timeout),
        )
        .await
        .unwrap_or_else(|_| {
            Err(SessionError::Timeout {
                stage: AttemptStage::Connect,
                after: self.options.connect_timeout,
            })
        });

        let (mut session, peer) = match connected {
            Ok(pair) => pair,
            Err(err) => {
                debug!(host, error = %err, "SMTP connection failed");
                attempt.outcome = fail(&mut attempt.events, AttemptStage::Connect, &err);
                return attempt;
            }
        };
        attempt.address = Some(peer.to_string());

        attempt.outcome = run_dialogue(
            &mut session,
            deadline,
            recipient,
            &self.options,
            &mut attempt.events,
        )
        .await;
        debug!(host, %peer, outcome = %attempt.outcome, "SMTP probe finished");
        attempt
    }
}

/// Drive the dialogue on an open session, from the greeting to `QUIT`.
///
/// The greeting must arrive before `greeting_deadline`; later replies are
/// bounded by the session's command timeout.
pub(crate) async fn run_dialogue<S>(
    session: &mut SmtpSession<S>,
    greeting_deadline: Instant,
    recipient: &EmailAddress,
    options: &ProbeOptions,
    events: &mut Vec<SmtpEvent>,
) -> ProbeOutcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let greeting = tokio::time::timeout_at(greeting_deadline, session.read_reply(AttemptStage::Greeting))
        .await
        .unwrap_or_else(|_| {
            Err(SessionError::Timeout {
                stage: AttemptStage::Greeting,
                after: options.connect_timeout,
            })
        });
    let greeting = match greeting {
        Ok(reply) => {
            events.push(SmtpEvent::Received {
                stage: AttemptStage::Greeting,
                reply: reply.clone(),
            });
            reply
        }
        Err(err) => return fail(events, AttemptStage::Greeting, &err),
    };
    if !greeting.is_positive_completion() {
        quit(session, events).await;
        return ProbeOutcome::unreachable(
            AttemptStage::Greeting,
            format!("server refused the session: {greeting}"),
        );
    }

    let ehlo = match exchange(session, events, AttemptStage::Ehlo, &options.ehlo_command()).await {
        Ok(reply) => reply,
        Err(err) => return fail(events, AttemptStage::Ehlo, &err),
    };
    if ehlo.is_permanent_failure() {
        // serveur ancien: repli sur HELO
        let helo = match exchange(session, events, AttemptStage::Helo, &options.helo_command()).await {
            Ok(reply) => reply,
            Err(err) => return fail(events, AttemptStage::Helo, &err),
        };
        if !helo.is_positive_completion() {
            quit(session, events).await;
            return ProbeOutcome::unreachable(AttemptStage::Helo, format!("HELO refused: {helo}"));
        }
    } else if !ehlo.is_positive_completion() {
        quit(session, events).await;
        return ProbeOutcome::unreachable(AttemptStage::Ehlo, format!("EHLO refused: {ehlo}"));
    }

    let mail = match exchange(session, events, AttemptStage::MailFrom, &options.mail_from_command()).await
    {
        Ok(reply) => reply,
        Err(err) => return fail(events, AttemptStage::MailFrom, &err),
    };
    if !mail.is_positive_completion() {
        quit(session, events).await;
        return ProbeOutcome::unreachable(AttemptStage::MailFrom, format!("sender refused: {mail}"));
    }

    let rcpt_cmd = format!("RCPT TO:<{recipient}>");
    let rcpt = match exchange(session, events, AttemptStage::RcptTo, &rcpt_cmd).await {
        Ok(reply) => reply,
        Err(err) => return fail(events, AttemptStage::RcptTo, &err),
    };

    quit(session, events).await;
    classify_rcpt(rcpt)
}

fn classify_rcpt(reply: SmtpReply) -> ProbeOutcome {
    if reply.is_positive_completion() {
        ProbeOutcome::Accepted { reply }
    } else {
        ProbeOutcome::Rejected { reply }
    }
}

async fn exchange<S>(
    session: &mut SmtpSession<S>,
    events: &mut Vec<SmtpEvent>,
    stage: AttemptStage,
    command: &str,
) -> Result<SmtpReply, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    events.push(SmtpEvent::Sent {
        stage,
        command: command.to_string(),
    });
    session.send_command(command, stage).await?;
    let reply = session.read_reply(stage).await?;
    events.push(SmtpEvent::Received {
        stage,
        reply: reply.clone(),
    });
    Ok(reply)
}

/// Best-effort `QUIT`; its outcome never changes the classification.
async fn quit<S>(session: &mut SmtpSession<S>, events: &mut Vec<SmtpEvent>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(err) = exchange(session, events, AttemptStage::Quit, "QUIT").await {
        events.push(SmtpEvent::Error {
            stage: AttemptStage::Quit,
            message: err.to_string(),
        });
    }
}

fn fail(events: &mut Vec<SmtpEvent>, stage: AttemptStage, err: &SessionError) -> ProbeOutcome {
    let message = err.to_string();
    events.push(SmtpEvent::Error {
        stage,
        message: message.clone(),
    });
    ProbeOutcome::unreachable(stage, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio_test::io::{Builder, Mock};

    fn recipient() -> EmailAddress {
        EmailAddress::parse("good@example.com").unwrap()
    }

    async fn dialogue(mock: Mock) -> (ProbeOutcome, Vec<SmtpEvent>) {
        let options = ProbeOptions::default();
        let mut session = SmtpSession::new(mock, options.command_timeout);
        let mut events = Vec::new();
        let deadline = Instant::now() + options.connect_timeout;
        let outcome =
            run_dialogue(&mut session, deadline, &recipient(), &options, &mut events).await;
        (outcome, events)
    }

    fn handshake(builder: &mut Builder) -> &mut Builder {
        builder
            .read(b"220 mx.example.com ESMTP\r\n")
            .write(b"EHLO test.com\r\n")
            .read(b"250-mx.example.com\r\n250 8BITMIME\r\n")
            .write(b"MAIL FROM:<test@example.com>\r\n")
            .read(b"250 2.1.0 Ok\r\n")
    }

    #[tokio::test]
    async fn accepted_recipient() {
        let mock = handshake(&mut Builder::new())
            .write(b"RCPT TO:<good@example.com>\r\n")
            .read(b"250 2.1.5 Ok\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 2.0.0 Bye\r\n")
            .build();
        let (outcome, events) = dialogue(mock).await;
        assert_eq!(
            outcome,
            ProbeOutcome::Accepted {
                reply: SmtpReply::new(250, "2.1.5 Ok")
            }
        );
        assert!(matches!(
            events.last(),
            Some(SmtpEvent::Received {
                stage: AttemptStage::Quit,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn rejected_recipient_keeps_reply() {
        let mock = handshake(&mut Builder::new())
            .write(b"RCPT TO:<good@example.com>\r\n")
            .read(b"550 5.1.1 User unknown\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 Bye\r\n")
            .build();
        let (outcome, _) = dialogue(mock).await;
        assert_eq!(
            outcome,
            ProbeOutcome::Rejected {
                reply: SmtpReply::new(550, "5.1.1 User unknown")
            }
        );
    }

    #[tokio::test]
    async fn temporary_rcpt_failure_is_a_rejection() {
        let mock = handshake(&mut Builder::new())
            .write(b"RCPT TO:<good@example.com>\r\n")
            .read(b"451 4.7.1 Greylisted\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 Bye\r\n")
            .build();
        let (outcome, _) = dialogue(mock).await;
        assert!(matches!(outcome, ProbeOutcome::Rejected { ref reply } if reply.code == 451));
    }

    #[tokio::test]
    async fn falls_back_to_helo() {
        let mock = Builder::new()
            .read(b"220 old.example.com\r\n")
            .write(b"EHLO test.com\r\n")
            .read(b"502 Command not implemented\r\n")
            .write(b"HELO test.com\r\n")
            .read(b"250 old.example.com\r\n")
            .write(b"MAIL FROM:<test@example.com>\r\n")
            .read(b"250 Ok\r\n")
            .write(b"RCPT TO:<good@example.com>\r\n")
            .read(b"250 Ok\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 Bye\r\n")
            .build();
        let (outcome, _) = dialogue(mock).await;
        assert!(outcome.is_accepted());
    }

    #[tokio::test]
    async fn refused_greeting_is_unreachable() {
        let mock = Builder::new()
            .read(b"554 5.7.1 No SMTP service here\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 Bye\r\n")
            .build();
        let (outcome, _) = dialogue(mock).await;
        assert!(matches!(
            outcome,
            ProbeOutcome::Unreachable {
                stage: AttemptStage::Greeting,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn refused_sender_is_unreachable_not_rejected() {
        let mock = Builder::new()
            .read(b"220 mx.example.com ESMTP\r\n")
            .write(b"EHLO test.com\r\n")
            .read(b"250 mx.example.com\r\n")
            .write(b"MAIL FROM:<test@example.com>\r\n")
            .read(b"553 5.7.1 Sender address rejected\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 Bye\r\n")
            .build();
        let (outcome, _) = dialogue(mock).await;
        assert!(matches!(
            outcome,
            ProbeOutcome::Unreachable {
                stage: AttemptStage::MailFrom,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn disconnect_before_rcpt_reply_is_unreachable() {
        let mock = handshake(&mut Builder::new())
            .write(b"RCPT TO:<good@example.com>\r\n")
            .build();
        let (outcome, events) = dialogue(mock).await;
        assert!(matches!(
            outcome,
            ProbeOutcome::Unreachable {
                stage: AttemptStage::RcptTo,
                ..
            }
        ));
        assert!(matches!(events.last(), Some(SmtpEvent::Error { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_greeting_respects_connect_budget() {
        let mock = Builder::new().wait(Duration::from_secs(3600)).build();
        let started = Instant::now();
        let (outcome, _) = dialogue(mock).await;
        assert!(matches!(
            outcome,
            ProbeOutcome::Unreachable {
                stage: AttemptStage::Greeting,
                ..
            }
        ));
        assert!(started.elapsed() <= ProbeOptions::default().connect_timeout);
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        // port libéré juste avant: la connexion est refusée
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let prober = SmtpProber::new(ProbeOptions {
            port,
            connect_timeout: Duration::from_secs(2),
            ..ProbeOptions::default()
        });
        let attempt = prober.probe("127.0.0.1", &recipient()).await;
        assert!(matches!(
            attempt.outcome,
            ProbeOutcome::Unreachable {
                stage: AttemptStage::Connect,
                ..
            }
        ));
        assert!(attempt.address.is_none());
    }

    #[tokio::test]
    async fn host_that_never_answers_is_cut_by_connect_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let connect_timeout = Duration::from_millis(300);
        let prober = SmtpProber::new(ProbeOptions {
            port,
            connect_timeout,
            ..ProbeOptions::default()
        });
        let started = std::time::Instant::now();
        let attempt = prober.probe("127.0.0.1", &recipient()).await;
        assert!(started.elapsed() < connect_timeout + Duration::from_secs(1));
        assert!(matches!(
            attempt.outcome,
            ProbeOutcome::Unreachable {
                stage: AttemptStage::Greeting,
                ..
            }
        ));
        server.abort();
    }

    #[tokio::test]
    async fn probes_loopback_server_end_to_end() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();
            write.write_all(b"220 mock.smtp.test ESMTP\r\n").await.unwrap();
            let mut received = Vec::new();
            while let Some(line) = lines.next_line().await.unwrap() {
                let reply: &[u8] = if line.starts_with("QUIT") {
                    b"221 Bye\r\n"
                } else {
                    b"250 Ok\r\n"
                };
                received.push(line);
                write.write_all(reply).await.unwrap();
                if reply.starts_with(b"221") {
                    break;
                }
            }
            received
        });

        let prober = SmtpProber::new(ProbeOptions {
            port,
            ..ProbeOptions::default()
        });
        let attempt = prober.probe("127.0.0.1", &recipient()).await;
        assert!(attempt.outcome.is_accepted(), "{:?}", attempt.outcome);
        assert_eq!(attempt.exchange, "127.0.0.1");
        assert!(attempt.address.is_some());

        let received = server.await.unwrap();
        assert_eq!(
            received,
            [
                "EHLO test.com",
                "MAIL FROM:<test@example.com>",
                "RCPT TO:<good@example.com>",
                "QUIT",
            ]
        );
    }
}

//! Line-oriented socket shell.
//!
//! Every accepted connection gets its own task. Each line is split into
//! words (quotes group words) and run as a primitive command with the
//! connection as output; `close` ends the session.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use ctlrun_core::Interpreter;

/// Shell word that ends the session.
pub const CLOSE: &str = "close";

/// Accept connections until the shutdown signal fires.
pub async fn serve(interp: Interpreter, listener: TcpListener, prompt: String) -> io::Result<()> {
    let shutdown = interp.shutdown().clone();
    tracing::info!(address = ?listener.local_addr().ok(), "Shell listening");

    loop {
        let accepted = tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            accepted = listener.accept() => accepted,
        };

        let (stream, peer) = match accepted {
            Ok(connection) => connection,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to accept shell connection");
                continue;
            }
        };

        let interp = interp.clone();
        let prompt = prompt.clone();
        tokio::spawn(async move {
            tracing::info!(peer = %peer, "Shell session opened");
            let (reader, writer) = stream.into_split();
            if let Err(e) = run_session(&interp, BufReader::new(reader), writer, &prompt).await {
                tracing::warn!(peer = %peer, error = %e, "Shell session failed");
            }
            tracing::info!(peer = %peer, "Shell session closed");
        });
    }

    tracing::info!("Shell stopped");
    Ok(())
}

/// Serve one session until `close`, end of input or shutdown.
pub async fn run_session<R, W>(
    interp: &Interpreter,
    reader: R,
    mut writer: W,
    prompt: &str,
) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let shutdown = interp.shutdown().clone();
    let mut lines = reader.lines();

    writer.write_all(prompt.as_bytes()).await?;
    writer.flush().await?;

    loop {
        let line = tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };

        let mut out: Vec<u8> = Vec::new();
        match split_words(&line) {
            Ok(words) => match words.split_first() {
                None => {}
                Some((name, _)) if name == CLOSE => break,
                Some((name, args)) => execute_line(interp, name, args, &mut out).await,
            },
            Err(message) => out.extend_from_slice(format!("{}\n", message).as_bytes()),
        }

        writer.write_all(&out).await?;
        writer.write_all(prompt.as_bytes()).await?;
        writer.flush().await?;
    }

    writer.shutdown().await
}

async fn execute_line(interp: &Interpreter, name: &str, args: &[String], out: &mut Vec<u8>) {
    use std::io::Write;

    if !interp.registry().has(name) {
        let _ = writeln!(out, "Unknown command: {}", name);
        let _ = writeln!(out, "Use 'help' to see all available commands");
        return;
    }

    tracing::debug!(command = %name, args = ?args, "Shell command");
    if let Err(e) = interp.run_command(name, out, args).await {
        let _ = writeln!(out, "Error: {}", e);
        tracing::warn!(command = %name, error = %e, "Shell command failed");
    }
}

/// Split a line into words. Single and double quotes group words; a
/// backslash escapes the next character outside single quotes.
pub fn split_words(line: &str) -> Result<Vec<String>, String> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mode {
        Normal,
        SingleQuoted,
        DoubleQuoted,
    }

    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut mode = Mode::Normal;
    let mut chars = line.chars();

    while let Some(ch) = chars.next() {
        match mode {
            Mode::Normal => match ch {
                '\'' => {
                    mode = Mode::SingleQuoted;
                    in_word = true;
                }
                '"' => {
                    mode = Mode::DoubleQuoted;
                    in_word = true;
                }
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                        in_word = true;
                    }
                }
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut current));
                        in_word = false;
                    }
                }
                _ => {
                    current.push(ch);
                    in_word = true;
                }
            },
            Mode::SingleQuoted => match ch {
                '\'' => mode = Mode::Normal,
                _ => current.push(ch),
            },
            Mode::DoubleQuoted => match ch {
                '"' => mode = Mode::Normal,
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                }
                _ => current.push(ch),
            },
        }
    }

    if mode != Mode::Normal {
        return Err("Unterminated quoted string".to_string());
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

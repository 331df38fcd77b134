use std::{
    env,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::{
    io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader},
    net::UnixStream,
};

const USAGE: &str = "usage: flightsurety-cli --socket-path <path> --caller <identity>";

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    socket_path: PathBuf,
    caller: String,
}

fn cli_options_from_args() -> Result<CliOptions> {
    parse_cli_options(env::args().skip(1))
}

fn parse_cli_options<I>(mut args: I) -> Result<CliOptions>
where
    I: Iterator<Item = String>,
{
    let mut socket_path = None;
    let mut caller = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--socket-path" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("missing value for --socket-path"))?;
                socket_path = Some(PathBuf::from(value));
            }
            "--caller" => {
                caller = Some(
                    args.next()
                        .ok_or_else(|| anyhow!("missing value for --caller"))?,
                );
            }
            other => bail!("unknown argument: {other}. {USAGE}"),
        }
    }

    let socket_path =
        socket_path.ok_or_else(|| anyhow!("missing required argument --socket-path. {USAGE}"))?;
    let caller = caller.ok_or_else(|| anyhow!("missing required argument --caller. {USAGE}"))?;
    if caller.trim().is_empty() {
        bail!("caller identity cannot be empty");
    }

    Ok(CliOptions {
        socket_path,
        caller,
    })
}

#[derive(Debug, Serialize)]
struct RequestLine<'a> {
    id: u64,
    caller: &'a str,
    call: Value,
}

/// Turns `<method> [json-object]` into the `call` object of a request.
fn parse_command(line: &str) -> Result<Value> {
    let line = line.trim();
    let (method, params) = match line.split_once(char::is_whitespace) {
        Some((method, rest)) => (method, rest.trim()),
        None => (line, ""),
    };
    if method.is_empty() {
        bail!("missing method name");
    }

    let mut call = if params.is_empty() {
        Map::new()
    } else {
        match serde_json::from_str::<Value>(params)
            .with_context(|| format!("parameters for '{method}' are not valid JSON"))?
        {
            Value::Object(map) => map,
            _ => bail!("parameters for '{method}' must be a JSON object"),
        }
    };
    if call.contains_key("method") {
        bail!("parameters cannot override 'method'");
    }
    call.insert("method".to_string(), Value::String(method.to_string()));
    Ok(Value::Object(call))
}

#[tokio::main]
async fn main() -> Result<()> {
    let options = cli_options_from_args()?;
    let stream = UnixStream::connect(&options.socket_path)
        .await
        .with_context(|| {
            format!(
                "failed to connect to FlightSurety socket {}",
                options.socket_path.display()
            )
        })?;

    let (read_half, mut write_half) = stream.into_split();
    let mut socket_lines = BufReader::new(read_half).lines();

    eprintln!(
        "flightsurety-cli connected: socket={} caller={}",
        options.socket_path.display(),
        options.caller
    );

    let request_counter = Arc::new(AtomicU64::new(1));
    let stdin_task = tokio::spawn({
        let caller = options.caller.clone();
        let counter = Arc::clone(&request_counter);
        let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();

        async move {
            while let Some(line) = stdin_lines.next_line().await? {
                if line.trim().is_empty() || line.trim_start().starts_with('#') {
                    continue;
                }

                let call = match parse_command(&line) {
                    Ok(call) => call,
                    Err(err) => {
                        eprintln!("[error] {err:#}");
                        continue;
                    }
                };
                let request = RequestLine {
                    id: counter.fetch_add(1, Ordering::Relaxed),
                    caller: &caller,
                    call,
                };
                send_line(&mut write_half, &request).await?;
            }

            write_half.shutdown().await?;
            Ok::<(), anyhow::Error>(())
        }
    });

    while let Some(line) = socket_lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let response: Value =
            serde_json::from_str(trimmed).context("failed to decode NDJSON response")?;
        println!("{}", render_response(&response));
    }

    stdin_task
        .await
        .context("stdin sender task join failed")??;
    Ok(())
}

fn render_response(response: &Value) -> String {
    let id = response.get("id").cloned().unwrap_or(Value::Null);
    if response.get("ok").and_then(Value::as_bool) == Some(true) {
        let result = response.get("result").cloned().unwrap_or(Value::Null);
        format!("#{id} ok {result}")
    } else {
        let kind = response
            .pointer("/error/kind")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let message = response
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or("");
        format!("#{id} error {kind}: {message}")
    }
}

async fn send_line<W, T>(writer: &mut W, message: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let encoded = serde_json::to_string(message)?;
    writer.write_all(encoded.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

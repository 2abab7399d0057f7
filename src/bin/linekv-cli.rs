//! linekv-cli - Interactive client for the linekv server
//!
//! Sends one line per command and prints the single response line.

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

const PROMPT: &str = "linekv> ";

const HELP: &str = "
Available commands:
SET <key> <value> : Set a key-value pair
GET <key>         : Get the value for a key
DEL <key>         : Delete a key-value pair
help              : Show this help message
exit              : Exit the program

Note: Keys and values must be alphanumeric (including underscores and hyphens)
";

/// Command-line options
#[derive(Parser, Debug)]
#[command(name = "linekv-cli", version, about = "Interactive client for linekv")]
struct Args {
    /// Address of the linekv server
    #[arg(long, default_value = "localhost:3223")]
    address: String,

    /// Timeout for connecting and for each response, e.g. 5s or 500ms
    #[arg(long, default_value = "5s", value_parser = linekv::config::parse_duration)]
    timeout: Duration,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let stream = tokio::time::timeout(args.timeout, TcpStream::connect(&args.address))
        .await
        .with_context(|| format!("timed out connecting to {}", args.address))?
        .with_context(|| format!("failed to connect to {}", args.address))?;
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    println!("Connected to linekv server. Type 'exit' to quit or 'help' for help.");

    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut input = String::new();

    loop {
        write_stdout(PROMPT).await?;

        input.clear();
        if stdin.read_line(&mut input).await? == 0 {
            break;
        }

        let text = input.trim();
        if text.eq_ignore_ascii_case("exit") {
            break;
        }
        if text.eq_ignore_ascii_case("help") {
            println!("{}", HELP);
            continue;
        }

        match round_trip(&mut reader, &mut writer, text, args.timeout).await {
            Ok(Some(response)) => print!("{}", response),
            Ok(None) => {
                println!("Server closed the connection");
                break;
            }
            Err(e) => println!("Error talking to server: {:#}", e),
        }
    }

    Ok(())
}

/// Sends one command and reads one response line.
///
/// Returns `Ok(None)` if the server has closed the connection.
async fn round_trip(
    reader: &mut BufReader<OwnedReadHalf>,
    writer: &mut OwnedWriteHalf,
    line: &str,
    timeout: Duration,
) -> Result<Option<String>> {
    writer
        .write_all(format!("{}\n", line).as_bytes())
        .await
        .context("error sending to server")?;

    let mut response = String::new();
    let n = tokio::time::timeout(timeout, reader.read_line(&mut response))
        .await
        .context("timed out waiting for response")?
        .context("error reading from server")?;

    Ok((n > 0).then_some(response))
}

async fn write_stdout(text: &str) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

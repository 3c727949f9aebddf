#![forbid(unsafe_code)]

//! `leader-commands-ctl`: follower-side companion for `leader-commands`.
//!
//! Stands in for a follower when checking a leader by hand: follow its
//! command stream, send a status report, or wait for its discovery
//! announcement.

use std::io::{BufRead, BufReader, Write};
use std::net::{Ipv4Addr, TcpStream, UdpSocket};
use std::time::Duration;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "leader-commands-ctl",
    about = "Follower-side companion for leader-commands",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Connect to a leader and print every command it sends.
    Follow {
        /// Leader host.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Leader command port.
        #[arg(long, default_value_t = 7777)]
        port: u16,
        /// Reply `COMMAND_COMPLETE` after each received command.
        #[arg(long)]
        ack: bool,
    },

    /// Send one `STATUS` report and disconnect.
    Status {
        /// Status text.
        message: String,
        /// Leader host.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Leader command port.
        #[arg(long, default_value_t = 7777)]
        port: u16,
    },

    /// Wait for one leader discovery announcement and print it.
    Discover {
        /// Discovery port to listen on.
        #[arg(long, default_value_t = 7778)]
        port: u16,
        /// Give up after this many seconds.
        #[arg(long, default_value_t = 15)]
        timeout_secs: u64,
    },
}

type CtlResult<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn main() {
    let args = Cli::parse();

    let result = match args.command {
        Command::Follow { host, port, ack } => follow(&host, port, ack),
        Command::Status {
            message,
            host,
            port,
        } => send_status(&host, port, &message),
        Command::Discover { port, timeout_secs } => discover(port, timeout_secs),
    };

    if let Err(err) = result {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

/// Follower report line with the current time.
fn report_line(kind: &str, data: &str) -> CtlResult<String> {
    let report = serde_json::json!({
        "Type": kind,
        "Data": data,
        "Timestamp": chrono::Utc::now().to_rfc3339(),
    });
    let mut line = serde_json::to_string(&report)?;
    line.push('\n');
    Ok(line)
}

fn follow(host: &str, port: u16, ack: bool) -> CtlResult<()> {
    let mut stream = TcpStream::connect((host, port))?;
    println!("connected to {host}:{port}");

    let reader = BufReader::new(stream.try_clone()?);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let command: serde_json::Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(err) => {
                eprintln!("unreadable line from leader: {err}");
                continue;
            }
        };
        println!("{}", serde_json::to_string_pretty(&command).unwrap_or_default());

        if ack {
            let name = command
                .get("Command")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("UNKNOWN");
            stream.write_all(report_line("COMMAND_COMPLETE", name)?.as_bytes())?;
            stream.flush()?;
        }
    }

    println!("leader closed the connection");
    Ok(())
}

fn send_status(host: &str, port: u16, message: &str) -> CtlResult<()> {
    let mut stream = TcpStream::connect((host, port))?;
    stream.write_all(report_line("STATUS", message)?.as_bytes())?;
    stream.flush()?;
    println!("OK");
    Ok(())
}

fn discover(port: u16, timeout_secs: u64) -> CtlResult<()> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port))?;
    socket.set_read_timeout(Some(Duration::from_secs(timeout_secs)))?;

    let mut buf = [0u8; 2048];
    let (len, from) = socket.recv_from(&mut buf)?;
    let announcement: serde_json::Value = serde_json::from_slice(&buf[..len])?;
    println!("announcement from {from}:");
    println!("{}", serde_json::to_string_pretty(&announcement)?);
    Ok(())
}

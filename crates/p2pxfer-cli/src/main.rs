//! p2pxfer — command-line front end for the sender/receiver cores.
//!
//! There is no daemon here: `send` runs a sender to completion against one
//! peer, `receive` runs a receiver to completion against one sender. The
//! out-of-band session descriptor (address, port, transfer id) is printed
//! to stdout on the sender side and read from arguments on the receiver
//! side — standing in for whatever out-of-band channel (QR code, paste,
//! link) actually carries it.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use p2pxfer_core::Config;
use p2pxfer_transfer::{Receiver, Sender};

const DEFAULT_PORT: u16 = 0;

fn print_usage() {
    println!("Usage: p2pxfer <command> [options]");
    println!();
    println!("Send");
    println!("  send <file> [--port <port>]        Listen and serve <file> to one peer");
    println!();
    println!("Receive");
    println!("  receive <ip> <port> <output_dir> [--id <transfer_id>]");
    println!("                                      Connect and receive into <output_dir>");
    println!();
    println!("Examples:");
    println!("  p2pxfer send report.pdf");
    println!("  p2pxfer send report.pdf --port 9000");
    println!("  p2pxfer receive 192.168.1.10 9000 ./downloads");
    println!("  p2pxfer receive 192.168.1.10 9000 ./downloads --id a1b2c3");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();

    match refs.as_slice() {
        ["send", file, rest @ ..] => run_send(file, rest).await,
        ["receive", ip, port, output_dir, rest @ ..] => {
            run_receive(ip, port, output_dir, rest).await
        }
        ["help"] | ["--help"] | ["-h"] | [] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

async fn run_send(file: &str, rest: &[&str]) -> Result<()> {
    let mut port = DEFAULT_PORT;
    let mut i = 0;
    while i < rest.len() {
        match rest[i] {
            "--port" => {
                i += 1;
                port = rest
                    .get(i)
                    .context("--port requires a value")?
                    .parse()
                    .context("--port must be a number")?;
            }
            other => bail!("Unknown option: {other}"),
        }
        i += 1;
    }

    let transfer_id = hex::encode(p2pxfer_core::crypto::sha256(file.as_bytes()))[..16].to_string();
    let config = Config::from_env();
    let sender = Sender::start(port, &PathBuf::from(file), transfer_id.clone(), config).await?;

    println!("listening on port {}", sender.actual_port());
    println!("transfer id: {transfer_id}");
    println!("public key: {}", hex::encode(sender.public_key_bytes()));
    println!("waiting for peer...");

    sender.serve_one().await?;
    println!("transfer complete: {}", sender.manifest().file_name);
    Ok(())
}

async fn run_receive(ip: &str, port: &str, output_dir: &str, rest: &[&str]) -> Result<()> {
    let port: u16 = port.parse().context("port must be a number")?;

    let mut expected_id = None;
    let mut i = 0;
    while i < rest.len() {
        match rest[i] {
            "--id" => {
                i += 1;
                expected_id = Some(
                    rest.get(i)
                        .context("--id requires a value")?
                        .to_string(),
                );
            }
            other => bail!("Unknown option: {other}"),
        }
        i += 1;
    }

    std::fs::create_dir_all(output_dir)?;
    let config = Config::from_env();
    let receiver = Receiver::new(config);

    println!("connecting to {ip}:{port}...");
    let path = receiver
        .run(ip, port, &PathBuf::from(output_dir), expected_id)
        .await?;
    println!("received: {}", path.display());
    Ok(())
}

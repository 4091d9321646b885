//! Terminal chat against a running professor-chat server.

use std::io::Write;

use anyhow::{Context, bail};
use clap::Parser;
use futures::StreamExt;
use professor_chat::transcript::{ChunkDecoder, Transcript, WELCOME_MESSAGE};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Ask the Rate My Professor assistant from the terminal")]
struct Args {
    /// Chat endpoint of the server.
    #[arg(long, env = "CHAT_URL", default_value = "http://localhost:3000/api/chat")]
    url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let http = reqwest::Client::new();
    let mut transcript = Transcript::new();
    println!("assistant> {WELCOME_MESSAGE}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let Some(payload) = transcript.begin_turn(&line) else {
            continue;
        };

        print!("assistant> ");
        if let Err(e) = stream_reply(&http, &args.url, &payload, &mut transcript).await {
            warn!(error = %e, "chat request failed");
            transcript.fail_turn();
            if let Some(last) = transcript.last() {
                print!("{}", last.content);
            }
        }
        println!();
    }
    Ok(())
}

async fn stream_reply(
    http: &reqwest::Client,
    url: &str,
    payload: &[professor_chat::message::ChatMessage],
    transcript: &mut Transcript,
) -> anyhow::Result<()> {
    let response = http.post(url).json(payload).send().await.context("sending chat request")?;
    if !response.status().is_success() {
        bail!("server answered {}", response.status());
    }

    let mut body = Box::pin(response.bytes_stream());
    let mut decoder = ChunkDecoder::new();
    while let Some(chunk) = body.next().await {
        let text = decoder.push(&chunk.context("reading reply")?);
        show(&text, transcript)?;
    }
    let rest = decoder.finish();
    show(&rest, transcript)?;
    Ok(())
}

fn show(text: &str, transcript: &mut Transcript) -> std::io::Result<()> {
    print!("{text}");
    std::io::stdout().flush()?;
    transcript.append_chunk(text);
    Ok(())
}

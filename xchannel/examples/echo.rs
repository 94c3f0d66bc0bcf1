//! Echo example using XChannel.
//!
//! This example wires two channels back to back over an in-memory pipe:
//! - Server echoes back every line it receives
//! - Client attaches its lines as an outbound source and prints the echoes
//!
//! Run with: cargo run --example echo

use futures::stream;
use xchannel::{ChannelConfig, DelimitedCodec, StringCodec, net};
use xchannel::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== XChannel Echo Example ===\n");

    let (client_io, server_io) = tokio::io::duplex(8192);
    let config = ChannelConfig::default().with_read_buffer_size(256);

    let server = net::connect::<_, _, String, String>(
        server_io,
        DelimitedCodec::lines(StringCodec),
        config.clone(),
    )?;
    let client = net::connect::<_, _, String, String>(client_io, DelimitedCodec::lines(StringCodec), config)?;

    // Server side: echo until the client hangs up.
    let echo = server.channel().clone();
    let mut requests = echo.subscribe();
    let server_task = tokio::spawn(async move {
        let mut count = 0;
        while let Some(Ok(line)) = requests.recv().await {
            if echo.send(format!("echo: {line}")).await.is_err() {
                break;
            }
            count += 1;
        }
        server.close().await;
        server.finished().await;
        count
    });

    // Client side: one source per batch, drained in attach order.
    let mut replies = client.channel().subscribe();
    let batches = [vec!["Hello", "World"], vec!["from", "xchannel"]];
    let expected: usize = batches.iter().map(Vec::len).sum();
    for batch in batches {
        let lines: Vec<String> = batch.into_iter().map(str::to_string).collect();
        client.channel().sink(stream::iter(lines))?;
    }

    for _ in 0..expected {
        match replies.recv().await {
            Some(Ok(reply)) => println!("  {reply}"),
            Some(Err(e)) => return Err(e),
            None => break,
        }
    }

    client.close().await;
    client.finished().await;
    let echoed = server_task.await.unwrap_or_default();

    println!("\n=== Done: {} lines echoed ===", echoed);
    Ok(())
}

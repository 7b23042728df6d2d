//! `greeter-client`: calls a running greeter in each interaction mode.

use clap::{Parser, Subcommand};
use greeter_tonic_core::{
    proto::{HelloRequest, greeter_client::GreeterClient},
    types::strip_banner,
};
use tokio_stream::StreamExt;
use tonic::{codec::CompressionEncoding, transport::Channel};

#[derive(Parser, Debug)]
#[command(name = "greeter-client", version, about = "Demo client for the greeter service")]
struct ClientArgs {
    /// Server endpoint.
    ///
    /// Environment variable: `GREETER_ENDPOINT`
    #[arg(long, env = "GREETER_ENDPOINT", default_value = "http://127.0.0.1:50051")]
    endpoint: String,

    /// Compress requests with zstd.
    #[arg(long, default_value_t = false)]
    zstd: bool,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// One request, one banner greeting. Only the name after the banner is printed.
    Unary { name: String },
    /// One request answered by the server's worker pool.
    Async { name: String },
    /// One request, a stream of banner greetings.
    ServerStream { name: String },
    /// Sends every name on one stream and prints each reply.
    BiStream {
        #[arg(required = true)]
        names: Vec<String>,
    },
}

fn request(name: String) -> HelloRequest {
    HelloRequest { name: Some(name) }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = ClientArgs::parse();

    let channel = Channel::from_shared(args.endpoint)?.connect().await?;
    let mut client = GreeterClient::new(channel).accept_compressed(CompressionEncoding::Zstd);
    if args.zstd {
        client = client.send_compressed(CompressionEncoding::Zstd);
    }

    match args.mode {
        Mode::Unary { name } => {
            let reply = client.say_hello(request(name)).await?.into_inner();
            println!(
                "{} bytes, greets {:?}",
                reply.message.len(),
                strip_banner(&reply.message)
            );
        }
        Mode::Async { name } => {
            let reply = client.say_hello_async(request(name)).await?.into_inner();
            println!("{}", reply.message);
        }
        Mode::ServerStream { name } => {
            let mut stream = client
                .say_hello_server_stream(request(name))
                .await?
                .into_inner();
            let mut k = 0;
            while let Some(reply) = stream.next().await {
                k += 1;
                let reply = reply?;
                println!(
                    "#{k}: {} bytes, greets {:?}",
                    reply.message.len(),
                    strip_banner(&reply.message)
                );
            }
            println!("completed after {k} replies");
        }
        Mode::BiStream { names } => {
            let outbound = tokio_stream::iter(names.into_iter().map(request));
            let mut stream = client.say_hello_bi_stream(outbound).await?.into_inner();
            while let Some(reply) = stream.next().await {
                println!("{}", reply?.message);
            }
            println!("completed");
        }
    }

    Ok(())
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod attachments;
mod client;
mod prompt;
mod session;

use attachments::load_image;
use client::ChatClient;
use prompt::rustyline::RustylinePrompt;
use session::Session;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the toolchat server
    #[arg(long, env = "TOOLCHAT_URL", default_value = "http://127.0.0.1:3000")]
    url: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive chat session
    Session,

    /// Send a single message and print the reply
    Run {
        /// The message to send
        prompt: String,

        /// Image to attach, as a file path or data URL (repeatable)
        #[arg(long = "image", value_name = "IMAGE")]
        images: Vec<String>,
    },

    /// List the tools the server can call
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = ChatClient::new(&cli.url);

    match cli.command.unwrap_or(Command::Session) {
        Command::Session => {
            let prompt = RustylinePrompt::new()?;
            let mut session = Session::new(client, Box::new(prompt));
            session.start().await?;
        }
        Command::Run { prompt, images } => {
            let images = images
                .iter()
                .map(|spec| load_image(spec))
                .collect::<Result<Vec<_>>>()?;
            let mut session = Session::new(client, Box::new(RustylinePrompt::new()?));
            session.headless_start(prompt, images).await?;
        }
        Command::Tools => {
            for tool in client.tools().await? {
                println!("{}", style(&tool.name).bold());
                println!("    {}", style(&tool.description).dim());
            }
        }
    }
    Ok(())
}

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "ytserv",
    about = "IRC bot that announces the titles of YouTube links posted in a channel",
    version
)]
pub struct Cli {
    /// Server to connect to
    pub server: String,

    /// Channel to join
    pub channel: String,

    /// Nickname
    pub nickname: String,

    /// API key for YouTube
    pub api_key: String,

    /// Server port (overrides the config file, default 6667)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log debug output
    #[arg(short, long)]
    pub verbose: bool,
}

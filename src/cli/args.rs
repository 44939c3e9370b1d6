use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "meetbots")]
#[command(about = "Fill video meetings with automated participants", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Base URL of a running meetbots service (default: from config)
    #[arg(long, global = true)]
    pub url: Option<String>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Run the service (default)
    Serve,
    /// Print version information
    Version,
    /// Show bot counts for all meetings, or the bots of one meeting
    Status(StatusCliArgs),
    /// Declare the desired bots for a meeting
    Add(AddCliArgs),
    /// Change the bot counts of a meeting
    Adjust(AdjustCliArgs),
}

#[derive(ClapArgs, Debug)]
pub struct StatusCliArgs {
    /// Show participants of this meeting only
    #[arg(short, long)]
    pub meeting: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct AddCliArgs {
    /// Meeting identifier
    pub meeting_id: String,
    /// Number of camera-on bots
    #[arg(long, default_value = "0")]
    pub video: usize,
    /// Number of camera-off bots
    #[arg(long, default_value = "0")]
    pub non_video: usize,
    /// Give the first new bot an open microphone
    #[arg(long)]
    pub audio: bool,
}

#[derive(ClapArgs, Debug)]
pub struct AdjustCliArgs {
    /// Meeting identifier
    pub meeting_id: String,
    /// New number of camera-on bots
    #[arg(long)]
    pub video: Option<usize>,
    /// New number of camera-off bots
    #[arg(long)]
    pub non_video: Option<usize>,
}

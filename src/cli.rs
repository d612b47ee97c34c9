use clap::{Parser, Subcommand};

use crate::stats::DateRange;

#[derive(Parser, Debug)]
#[command(
    name = "beaware",
    version = env!("CARGO_PKG_VERSION"),
    about = "Foreground dwell tracking with a floating timer pill"
)]
pub struct Args {
    #[arg(short, long, action)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    #[command(about = "Track the selected apps until interrupted (Ctrl-C)")]
    Track,

    #[command(about = "Replace the set of tracked apps")]
    Select {
        #[arg(required = true, value_name = "APP")]
        packages: Vec<String>,
    },

    #[command(about = "Stop tracking every app")]
    Clear,

    #[command(about = "Set the display name shown for an app")]
    Label { package: String, label: String },

    #[command(about = "Print time spent per app")]
    Stats {
        #[arg(long, value_enum, default_value_t = DateRange::Today)]
        range: DateRange,
    },

    #[command(about = "List sessions recorded in a range, newest first")]
    Sessions {
        #[arg(long, value_enum, default_value_t = DateRange::Today)]
        range: DateRange,
    },
}

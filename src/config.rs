use clap::Parser;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)] // Read from `Cargo.toml`
pub struct Config {
    /// metainfo (.torrent) file
    #[clap(short, long, value_parser)]
    pub file: String,

    /// port announced to trackers for incoming peer connections
    #[clap(short, long, value_parser, default_value_t = 6881)]
    pub port: u16,
}

impl Config {
    pub fn new() -> Config {
        Config::parse()
    }
}

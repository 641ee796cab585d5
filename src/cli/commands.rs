use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "linkchain")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "startnode", about = "Start a node")]
    StartNode {
        #[arg(long = "config", help = "TOML file with node settings")]
        config: Option<PathBuf>,
        #[arg(long = "id", help = "Node identity announced in status messages")]
        id: Option<String>,
        #[arg(long = "listen", help = "Address to accept peer connections on")]
        listen: Option<String>,
        #[arg(long = "seed", help = "Peer to dial at startup (repeatable)")]
        seeds: Vec<String>,
        #[arg(long = "block-time-ms", help = "Interval between produced blocks")]
        block_time_ms: Option<u64>,
        #[arg(long = "key-file", help = "Hex PKCS#8 producer key")]
        key_file: Option<PathBuf>,
        #[arg(long = "producer", help = "Produce blocks, with a fresh key if none is given")]
        producer: bool,
        #[arg(long = "data-dir", help = "Store blocks in a sled database at this path")]
        data_dir: Option<PathBuf>,
    },
    #[command(name = "printchain", about = "Print every stored block as JSON")]
    PrintChain {
        #[arg(long = "data-dir", help = "Block database written by startnode --data-dir")]
        data_dir: PathBuf,
    },
    #[command(name = "genkey", about = "Generate a producer key")]
    GenKey {
        #[arg(long = "out", help = "File to write the hex encoded key to")]
        out: PathBuf,
    },
}

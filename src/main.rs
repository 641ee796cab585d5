// Entry point for the node binary
// I keep this thin: parse the command line, build the config, hand off to the server
use clap::Parser;
use linkchain::{
    api, Block, Blockchain, BlockchainError, Command, NodeConfig, Opt, PrivateKey, Server,
    SledStore,
};
use log::{error, info, LevelFilter};
use std::fs;
use std::process;

fn main() {
    // Info level by default; RUST_LOG still overrides it
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Command) -> Result<(), BlockchainError> {
    match command {
        Command::StartNode {
            config,
            id,
            listen,
            seeds,
            block_time_ms,
            key_file,
            producer,
            data_dir,
        } => {
            // defaults, then the file, then the environment, then flags
            let mut node_config = match config {
                Some(path) => NodeConfig::from_toml_file(&path)?,
                None => NodeConfig::default(),
            };
            node_config.apply_env()?;

            if let Some(id) = id {
                node_config.id = id;
            }
            if let Some(listen) = listen {
                node_config.listen_addr = listen;
            }
            if !seeds.is_empty() {
                node_config.seed_nodes = seeds;
            }
            if let Some(ms) = block_time_ms {
                node_config.block_time_ms = ms;
            }
            if key_file.is_some() {
                node_config.key_file = key_file;
            }
            if data_dir.is_some() {
                node_config.data_dir = data_dir;
            }
            node_config.producer |= producer;

            info!("Starting node {}", node_config.id);
            let server = Server::new(node_config.into_server_options()?)?;
            server.start()?;
        }
        // Reads the sled store directly, so the node must not be running
        Command::PrintChain { data_dir } => {
            let store = SledStore::open(&data_dir)?;
            let chain = Blockchain::with_storage(Block::genesis(), Box::new(store))?;
            for height in 0..=chain.height() {
                let view = api::get_block(&chain, &height.to_string())?;
                let json = serde_json::to_string_pretty(&view)
                    .map_err(|e| BlockchainError::Serialization(e.to_string()))?;
                println!("{json}");
            }
        }
        Command::GenKey { out } => {
            let key = PrivateKey::generate()?;
            fs::write(&out, key.to_hex().as_bytes())?;
            println!("Wrote key to {}", out.display());
            println!("Producer address: {}", key.public_key().address());
        }
    }
    Ok(())
}

// Entry point for the node binary: parse the command, run it, exit non-zero on failure.
use clap::Parser;
use ember_chain::cli::StartNodeArgs;
use ember_chain::{ChainStore, Command, Config, Ledger, LogHandler, Node, Opt, Result, Wallets};
use log::{error, info, LevelFilter};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

fn main() {
    // Info by default; RUST_LOG still overrides it.
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

fn run_command(command: Command) -> Result<()> {
    match command {
        Command::StartNode(args) => start_node(args),
        Command::Createwallet { wallet } => {
            let path = wallet_path(wallet)?;
            let mut wallets = Wallets::load(&path)?;
            let address = wallets.create_address()?;
            println!("Your new address: {address}");
            Ok(())
        }
        Command::ListAddresses { wallet } => {
            let wallets = Wallets::load(wallet_path(wallet)?)?;
            for address in wallets.get_addresses() {
                println!("{address}");
            }
            Ok(())
        }
        Command::Printchain { chain } => {
            let path = match chain {
                Some(path) => path,
                None => Config::resolve(None)?.chain_file,
            };
            print_chain(&path)
        }
    }
}

fn start_node(args: StartNodeArgs) -> Result<()> {
    // Defaults, then the file, then the environment, then the flags.
    let mut config = Config::resolve(args.config.as_deref())?;
    args.apply_to(&mut config);

    // The node always has an address of its own; mining rewards go to it.
    let mut wallets = Wallets::load(&config.wallet_file)?;
    let address = match wallets.first_address() {
        Some(address) => address,
        None => wallets.create_address()?,
    };
    info!("Using wallet address {address}");

    let node = Node::new(config, Some(&address), Arc::new(LogHandler))?;
    info!("Node listening on {}", node.local_addr());
    node.run()
}

fn wallet_path(flag: Option<PathBuf>) -> Result<PathBuf> {
    match flag {
        Some(path) => Ok(path),
        None => Ok(Config::resolve(None)?.wallet_file),
    }
}

fn print_chain(path: &std::path::Path) -> Result<()> {
    let blocks = match ChainStore::new(path).load()? {
        Some(blocks) => blocks,
        None => {
            println!("No chain at {}", path.display());
            return Ok(());
        }
    };
    Ledger::verify_chain(&blocks)?;

    for block in blocks.iter().rev() {
        println!("Block {}", block.get_index());
        println!("  hash:       {}", block.get_hash());
        println!("  prev hash:  {}", block.get_prev_hash());
        println!("  timestamp:  {}", block.get_timestamp());
        println!("  nonce:      {}", block.get_nonce());
        println!("  difficulty: {}", block.get_difficulty());
        for entry in block.get_transactions() {
            match entry.as_transaction() {
                Some(tx) => println!("  - {tx}"),
                None => println!("  - {}", entry.canonical_text()),
            }
        }
        println!();
    }
    Ok(())
}

use crate::config::Config;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ember-chain", about = "A minimal proof-of-work ledger node")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "startnode", about = "Start a node")]
    StartNode(StartNodeArgs),
    #[command(name = "createwallet", about = "Create a new wallet address")]
    Createwallet {
        #[arg(long, help = "Wallet file to add the address to")]
        wallet: Option<PathBuf>,
    },
    #[command(name = "listaddresses", about = "Print local wallet addresses")]
    ListAddresses {
        #[arg(long, help = "Wallet file to read")]
        wallet: Option<PathBuf>,
    },
    #[command(name = "printchain", about = "Print all blocks in the chain")]
    Printchain {
        #[arg(long, help = "Chain file to read")]
        chain: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
pub struct StartNodeArgs {
    #[arg(long, help = "Address to listen on")]
    pub host: Option<String>,
    #[arg(long, help = "Port to listen on")]
    pub port: Option<u16>,
    #[arg(long, help = "Mine blocks, paying rewards to the first wallet address")]
    pub mine: bool,
    #[arg(long, help = "Wallet file")]
    pub wallet: Option<PathBuf>,
    #[arg(long, help = "Chain file")]
    pub chain: Option<PathBuf>,
    #[arg(long, value_name = "ADDR", help = "Peer to connect to on startup")]
    pub bootstrap: Option<String>,
    #[arg(long, conflicts_with = "bootstrap", help = "Start without a bootstrap peer")]
    pub no_bootstrap: bool,
    #[arg(long, help = "Leading zero hex digits required of a block hash")]
    pub difficulty: Option<u32>,
    #[arg(long, help = "TOML configuration file")]
    pub config: Option<PathBuf>,
}

impl StartNodeArgs {
    /// Flags win over the file and the environment.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.mine {
            config.mine = true;
        }
        if let Some(wallet) = &self.wallet {
            config.wallet_file = wallet.clone();
        }
        if let Some(chain) = &self.chain {
            config.chain_file = chain.clone();
        }
        if let Some(bootstrap) = &self.bootstrap {
            config.bootstrap_peer = Some(bootstrap.clone());
        }
        if self.no_bootstrap {
            config.bootstrap_peer = None;
        }
        if let Some(difficulty) = self.difficulty {
            config.difficulty = difficulty;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_startnode_flags() {
        let opt = Opt::try_parse_from([
            "ember-chain",
            "startnode",
            "--port",
            "9000",
            "--mine",
            "--no-bootstrap",
            "--difficulty",
            "2",
        ])
        .unwrap();

        let args = match opt.command {
            Command::StartNode(args) => args,
            other => panic!("unexpected command {other:?}"),
        };
        let mut config = Config::default();
        args.apply_to(&mut config);

        assert_eq!(config.port, 9000);
        assert!(config.mine);
        assert!(config.bootstrap_peer.is_none());
        assert_eq!(config.difficulty, 2);
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn test_bootstrap_flags_conflict() {
        let result = Opt::try_parse_from([
            "ember-chain",
            "startnode",
            "--bootstrap",
            "10.0.0.1:8333",
            "--no-bootstrap",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_wallet_commands() {
        let opt = Opt::try_parse_from(["ember-chain", "createwallet", "--wallet", "w.dat"]).unwrap();
        assert!(matches!(
            opt.command,
            Command::Createwallet { wallet: Some(ref p) } if p == &PathBuf::from("w.dat")
        ));

        let opt = Opt::try_parse_from(["ember-chain", "printchain"]).unwrap();
        assert!(matches!(opt.command, Command::Printchain { chain: None }));
    }
}

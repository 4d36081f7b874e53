// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::config::Config;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fabric::apps::{AppChain, Firewall, L2Switch, Router};
use fabric::connection::{SwitchListener, SwitchListenerTcp};
use fabric::controller::Controller;
use fabric::sweeper::Sweeper;
use fabric::topology::Topology;
use fabric::inf;
use of_common::log::init_logger;
use slog::Logger;
use std::sync::Arc;
use std::thread::Builder;

mod admin;
mod config;

const UNIT_DAEMON: &str = "daemon";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the fabric controller daemon.
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Path to the configuration file.
    #[arg(long, default_value = "/etc/fabricd/config.toml")]
    config: String,
}

fn main() {
    let args = Cli::parse();
    match args.command {
        Commands::Run(run_args) => run(run_args),
    }
}

fn run(args: RunArgs) {
    let log = init_logger();
    let config = Config::load(&args.config).expect("load configuration");

    let db = swdb::Db::new(
        &format!("{}/swdb", config.data_dir),
        log.clone(),
    )
    .expect("open datastore");

    let topology = Topology::new(log.clone());
    let chain = Arc::new(
        build_chain(&config, &db, &log).expect("build app chain"),
    );
    inf!(log, UNIT_DAEMON, "app chain: {chain}");
    topology.set_event_listener(chain.clone());

    let controller =
        Controller::new(Arc::clone(&topology), chain, log.clone());

    let _sweeper = Sweeper::new(
        Arc::clone(&topology),
        controller.shutdown_flag(),
        log.clone(),
    )
    .run();

    let listener = SwitchListenerTcp::bind(&config.listen, log.clone())
        .expect("bind switch listener");
    inf!(
        log,
        UNIT_DAEMON,
        "listening for switches on {}",
        config.listen
    );
    {
        let controller = Arc::clone(&controller);
        Builder::new()
            .name("accept".to_string())
            .spawn(move || controller.run(listener))
            .expect("spawn accept loop");
    }

    let context = Arc::new(admin::HandlerContext {
        db,
        controller: Arc::clone(&controller),
        log: log.clone(),
    });

    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");
    rt.block_on(async {
        let server = admin::start_server(log.clone(), &config, context)
            .expect("start admin server");
        server.await.expect("admin server quit unexpectedly");
    });

    controller.shutdown();
}

fn build_chain(
    config: &Config,
    db: &swdb::Db,
    log: &Logger,
) -> Result<AppChain> {
    let mut chain = AppChain::new(log.clone());
    for name in &config.apps {
        match name.as_str() {
            "l2switch" => chain
                .register(Arc::new(L2Switch::new(log.clone())))
                .context("init l2switch")?,
            "router" => {
                let router = config
                    .router
                    .as_ref()
                    .expect("validated router config");
                chain
                    .register(Arc::new(Router::new(
                        router.mac,
                        db.clone(),
                        log.clone(),
                    )))
                    .context("init router")?
            }
            "firewall" => chain
                .register(Arc::new(Firewall::new(db.clone(), log.clone())))
                .context("init firewall")?,
            other => bail!("unknown app {other:?} in chain"),
        }
    }
    Ok(chain)
}

#[cfg(test)]
mod test {
    use super::*;

    fn config(toml: &str) -> Config {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn chain_follows_configured_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = init_logger();
        let db =
            swdb::Db::new(dir.path().to_str().unwrap(), log.clone()).unwrap();
        let cfg = config(
            r#"
            apps = ["firewall", "router", "l2switch"]
            [rest]
            port = 7000
            [router]
            mac = "00:11:22:33:44:55"
            "#,
        );
        let chain = build_chain(&cfg, &db, &log).unwrap();
        assert_eq!(chain.names(), vec!["firewall", "router", "l2switch"]);
    }

    #[test]
    fn unknown_app_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = init_logger();
        let db =
            swdb::Db::new(dir.path().to_str().unwrap(), log.clone()).unwrap();
        let cfg = config(
            r#"
            apps = ["nat"]
            [rest]
            port = 7000
            "#,
        );
        assert!(build_chain(&cfg, &db, &log).is_err());
    }
}

//! CLI for the hop rewriting proxy.

mod commands;
mod frontend;
mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use hop_core::config;

use commands::{run_cache_path, run_completions, run_cookies, run_fetch, run_man, run_serve};

/// Top-level CLI for the hop proxy.
#[derive(Debug, Parser)]
#[command(name = "hop")]
#[command(about = "hop: forward proxy that rewrites pages so navigation stays proxied", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the HTTP front end.
    Serve {
        /// Listen address (overrides `listen` from config.toml).
        #[arg(long, value_name = "ADDR")]
        listen: Option<String>,
    },

    /// Run one proxy cycle for a URL and print the rewritten page.
    Fetch {
        /// Target URL.
        url: String,
        /// Proxy query parameters (e.g. "r=DOM&r_url=1"). Empty keeps every default.
        #[arg(long, default_value = "", value_name = "QUERY")]
        query: String,
        /// Session identity used for the cookie jar.
        #[arg(long, default_value = "cli", value_name = "ID")]
        session: String,
        /// Form body; sends the request as POST.
        #[arg(long, value_name = "BODY")]
        post: Option<String>,
    },

    /// Show the persisted cookie jar for a session and host.
    Cookies {
        /// Session identity.
        session: String,
        /// Origin host (port and path are ignored).
        host: String,
    },

    /// Print the cache location of an asset URL.
    CachePath {
        /// Asset URL.
        url: String,
    },

    /// Generate shell completions on stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Render the man page on stdout.
    Man,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        // Neither needs a config file.
        match cli.command {
            CliCommand::Completions { shell } => return run_completions(shell),
            CliCommand::Man => return run_man(),
            _ => {}
        }

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Serve { listen } => run_serve(&cfg, listen.as_deref()).await?,
            CliCommand::Fetch {
                url,
                query,
                session,
                post,
            } => run_fetch(&cfg, &url, &query, &session, post).await?,
            CliCommand::Cookies { session, host } => run_cookies(&cfg, &session, &host)?,
            CliCommand::CachePath { url } => run_cache_path(&cfg, &url)?,
            CliCommand::Completions { .. } | CliCommand::Man => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;

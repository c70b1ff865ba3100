//! Command-line interface for the bridge binary.

use crate::config::Config;
use clap::{Parser, Subcommand};
use janus_sigil::{IssuedSigil, SigilAuthenticator};
use janus_types::{AgentPrefix, AgentRole, AgentTier, SigilType};
use std::fmt::Write as _;
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "janus-server", version, about = "Janus neural link bridge")]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, env = "JANUS_CONFIG_PATH")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub cmd: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Run the bridge (default).
    Serve,

    /// Issue a sigil signed with the configured master secret.
    IssueSigil {
        /// Agent the sigil is issued to.
        agent_id: String,

        #[arg(long, default_value = "MW")]
        prefix: AgentPrefix,

        #[arg(long, default_value = "WKR")]
        role: AgentRole,

        #[arg(long, default_value = "TIER3")]
        tier: AgentTier,

        #[arg(long = "type", default_value = "SNTNL")]
        sigil_type: SigilType,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum CliError {
    /// Sigils signed with a throwaway secret would never verify against the bridge.
    #[error("auth.master_secret (or JANUS_MASTER_SECRET) must be set to issue sigils")]
    MissingMasterSecret,
}

/// Issues a sigil for `agent_id` under the configured master secret.
///
/// A secret already configured for the agent is reused, so its existing
/// sigils stay valid.
pub fn issue_sigil(
    config: &Config,
    agent_id: &str,
    prefix: AgentPrefix,
    role: AgentRole,
    tier: AgentTier,
    sigil_type: SigilType,
) -> Result<IssuedSigil, CliError> {
    let master_secret = config
        .auth
        .master_secret
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or(CliError::MissingMasterSecret)?;
    let authenticator = SigilAuthenticator::new(master_secret);
    let secrets = config.auth.secret_store();
    Ok(secrets.provision(&authenticator, agent_id, prefix, role, tier, sigil_type))
}

/// Output for `issue-sigil`: the sigil and the config entry provisioning it.
pub fn render_issued(agent_id: &str, issued: &IssuedSigil) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "sigil: {}", issued.sigil);
    let _ = writeln!(out);
    let _ = writeln!(out, "[[auth.agents]]");
    let _ = writeln!(out, "agent_id = {agent_id:?}");
    let _ = writeln!(out, "secret = {:?}", issued.agent_secret.as_str());
    out
}

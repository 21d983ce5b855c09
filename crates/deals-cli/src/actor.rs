//! Acting-user resolution.
//!
//! Chain: `--actor` flag > `DEALS_ACTOR` env > `USER` env (interactive only).
//! Mutating commands record the actor on stage changes and completions;
//! read-only commands never ask for one.

use std::env;

pub const ACTOR_ENV: &str = "DEALS_ACTOR";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct MissingActor {
    pub message: String,
    pub code: &'static str,
}

trait EnvReader {
    fn get(&self, key: &str) -> Option<String>;
    fn is_tty(&self) -> bool;
}

struct RealEnv;

impl EnvReader for RealEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    fn is_tty(&self) -> bool {
        use std::io::IsTerminal;
        std::io::stdin().is_terminal()
    }
}

fn resolve_actor_with(cli_flag: Option<&str>, env: &dyn EnvReader) -> Option<String> {
    if let Some(actor) = cli_flag.map(str::trim).filter(|a| !a.is_empty()) {
        return Some(actor.to_string());
    }

    if let Some(val) = env.get(ACTOR_ENV) {
        return Some(val.trim().to_string());
    }

    // A login name is only trusted when a person is at the keyboard.
    if env.is_tty() {
        return env.get("USER");
    }

    None
}

pub fn resolve_actor(cli_flag: Option<&str>) -> Option<String> {
    resolve_actor_with(cli_flag, &RealEnv)
}

/// Resolve the actor or fail with a `missing_actor` error.
pub fn require_actor(cli_flag: Option<&str>) -> Result<String, MissingActor> {
    resolve_actor(cli_flag).ok_or_else(|| MissingActor {
        message: format!("Acting user required for this command. Set --actor or {ACTOR_ENV}."),
        code: "missing_actor",
    })
}

use stepwise::Config;

use crate::GlobalArgs;

pub mod registry;
pub mod run;
pub mod status;

/// Defaults overridden by flags and environment
pub fn config_from(globals: &GlobalArgs) -> Config {
    let mut config = Config::default();
    if let Some(url) = globals
        .bridge_url
        .clone()
        .or_else(|| std::env::var("MCP_BRIDGE_URL").ok())
    {
        config.bridge_url = url;
    }
    if let Some(url) = &globals.oracle_url {
        config.oracle_url = url.clone();
    }
    if let Some(dir) = &globals.data_dir {
        config.data_dir = dir.clone();
    }
    config.totp_secret = globals.totp_secret.clone();
    if let Some(runner) = &globals.runner {
        let command = split_command(runner);
        if !command.is_empty() {
            config.runner_command = command;
        }
    }
    config
}

pub fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
#[path = "../commands_test.rs"]
mod commands_test;

use anyhow::Result;
use serde_json::json;

use stepwise::{Config, ExecutionManager, RunRegistry};

pub fn handle_status(config: Config, execution_id: &str) -> Result<()> {
    let manager = ExecutionManager::new(config, RunRegistry::new());
    let output = match manager.monitor(execution_id) {
        Some(view) => serde_json::to_value(view)?,
        None => json!({ "status": "not_found", "progress": 0 }),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

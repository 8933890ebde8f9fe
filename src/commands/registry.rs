use anyhow::{Context, Result};
use serde_json::json;

use stepwise::registry::{self, SelectorRegistry};
use stepwise::step_text::{self, Verb};
use stepwise::Config;

pub fn handle_lookup(
    config: &Config,
    url: &str,
    step: &str,
    element_type: Option<&str>,
) -> Result<()> {
    let verb = step_text::infer_verb(step).unwrap_or(Verb::Click);
    let element_type = element_type
        .or_else(|| step_text::infer_element_type(step, verb))
        .context("Could not infer an element type from the step; pass --element-type")?;

    let registry = SelectorRegistry::new(config.selectors_dir());
    let selector = registry.lookup(url, step, element_type, verb);
    let output = json!({
        "domain": registry::extract_domain(url),
        "element_type": element_type,
        "verb": verb.as_str(),
        "selector": selector,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub fn handle_show(config: &Config, domain: &str) -> Result<()> {
    let registry = SelectorRegistry::new(config.selectors_dir());
    let contents = registry.domain_registry(domain);
    println!("{}", serde_json::to_string_pretty(&contents)?);
    Ok(())
}

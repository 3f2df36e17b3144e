use super::{json_pretty, GlobalOpts, EXIT_SUCCESS};
use std::path::Path;

pub fn run(opts: &GlobalOpts, plan_path: &Path) -> Result<u8, String> {
    let state = opts.state_file(plan_path);
    let managed = state
        .load()
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("no saved state at {}", state.path().display()))?;

    if opts.json {
        println!("{}", json_pretty(&managed)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("id:           {}", managed.id);
    println!("last updated: {}", managed.last_updated);
    if managed.is_empty() {
        println!("no managed buckets");
        return Ok(EXIT_SUCCESS);
    }
    println!();
    println!("{:<32} {:<34} TAGS", "NAME", "OBSERVED");
    for item in &managed.items {
        let tags = item
            .tags
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",");
        println!("{:<32} {:<34} {tags}", item.name.as_str(), item.observed_at);
    }
    Ok(EXIT_SUCCESS)
}

use super::{json_pretty, load_plan, EXIT_SUCCESS};
use std::path::Path;

pub fn run(plan_path: &Path, json: bool) -> Result<u8, String> {
    let plan = load_plan(plan_path)?;
    if json {
        let buckets: Vec<_> = plan
            .iter()
            .map(|item| serde_json::json!({ "name": item.name(), "tags": item.tags() }))
            .collect();
        let payload = serde_json::json!({ "valid": true, "buckets": buckets });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("plan valid: {} buckets", plan.len());
        for item in &plan {
            println!("  {} ({} tags)", item.name(), item.tags().len());
        }
    }
    Ok(EXIT_SUCCESS)
}

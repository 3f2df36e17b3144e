use super::{
    exit_code_for, json_pretty, make_store, pass_spinner, print_diagnostics, spin_fail, spin_ok,
    GlobalOpts, EXIT_SUCCESS,
};
use bucketctl_core::Reconciler;
use std::path::Path;

pub fn run(opts: &GlobalOpts, plan_path: &Path) -> Result<u8, String> {
    let state = opts.state_file(plan_path);
    let Some(managed) = state.load().map_err(|e| e.to_string())? else {
        if opts.json {
            println!("{}", json_pretty(&serde_json::json!({ "deleted": 0 }))?);
        } else {
            println!("nothing to destroy");
        }
        return Ok(EXIT_SUCCESS);
    };
    let store = make_store(opts)?;
    let reconciler = Reconciler::new(&store).with_policy(opts.policy);

    let pb = pass_spinner(&format!("deleting {} buckets…", managed.len()), opts.json);
    let report = reconciler.delete(&managed);
    let deleted = managed.len() - report.remaining.len();

    let persisted = if report.remaining.is_empty() {
        state.remove()
    } else {
        state.save(&report.remaining)
    };
    persisted.map_err(|e| {
        spin_fail(&pb, "destroy failed");
        e.to_string()
    })?;
    if report.diagnostics.has_errors() {
        spin_fail(&pb, "destroy finished with errors");
    } else {
        spin_ok(&pb, "destroy complete");
    }

    if opts.json {
        let payload = serde_json::json!({
            "deleted": deleted,
            "remaining": report.remaining.names(),
            "aborted": report.aborted,
            "diagnostics": report.diagnostics,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        print_diagnostics(&report.diagnostics);
        println!("deleted {deleted} buckets");
        if !report.remaining.is_empty() {
            println!(
                "{} buckets still managed: {}",
                report.remaining.len(),
                report.remaining.names().join(", ")
            );
        }
    }
    Ok(exit_code_for(&report.diagnostics))
}

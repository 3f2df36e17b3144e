use super::{
    exit_code_for, json_pretty, load_plan, make_store, pass_spinner, print_diagnostics, spin_fail,
    spin_ok, GlobalOpts,
};
use bucketctl_core::Reconciler;
use std::path::Path;

pub fn run(opts: &GlobalOpts, plan_path: &Path) -> Result<u8, String> {
    let plan = load_plan(plan_path)?;
    let state = opts.state_file(plan_path);
    let previous = state.load().map_err(|e| e.to_string())?;
    let store = make_store(opts)?;
    let reconciler = Reconciler::new(&store).with_policy(opts.policy);

    let action = if previous.is_some() { "update" } else { "create" };
    let pb = pass_spinner(&format!("applying {} buckets…", plan.len()), opts.json);
    let report = reconciler.apply(&plan, previous.as_ref());

    match &report.managed {
        Some(managed) => {
            state.save(managed).map_err(|e| {
                spin_fail(&pb, "apply failed");
                e.to_string()
            })?;
            if report.diagnostics.has_errors() {
                spin_fail(&pb, "apply finished with errors");
            } else {
                spin_ok(&pb, "apply complete");
            }
        }
        None => spin_fail(&pb, "apply stopped"),
    }

    if opts.json {
        let payload = serde_json::json!({
            "action": action,
            "managed": report.managed,
            "diagnostics": report.diagnostics,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        print_diagnostics(&report.diagnostics);
        match &report.managed {
            Some(managed) => {
                println!("{} of {} buckets in place", managed.len(), plan.len());
                println!("state saved to {}", state.path().display());
            }
            None => {
                println!("stopped at first failure; state not changed");
                println!(
                    "buckets created before the failure are not tracked; rerun with \
                     --continue-on-error to record them, or delete them by hand"
                );
            }
        }
    }
    Ok(exit_code_for(&report.diagnostics))
}

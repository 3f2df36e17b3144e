use super::{
    exit_code_for, json_pretty, make_store, pass_spinner, print_diagnostics, spin_fail, spin_ok,
    GlobalOpts,
};
use bucketctl_core::Reconciler;
use std::path::Path;

pub fn run(opts: &GlobalOpts, plan_path: &Path) -> Result<u8, String> {
    let state = opts.state_file(plan_path);
    let managed = state
        .load()
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("no saved state at {}", state.path().display()))?;
    let store = make_store(opts)?;
    let reconciler = Reconciler::new(&store).with_policy(opts.policy);

    let pb = pass_spinner(&format!("checking {} buckets…", managed.len()), opts.json);
    let report = reconciler.read(&managed);
    match &report.managed {
        Some(refreshed) => {
            state.save(refreshed).map_err(|e| {
                spin_fail(&pb, "refresh failed");
                e.to_string()
            })?;
            spin_ok(&pb, "refresh complete");
        }
        None => spin_fail(&pb, "refresh stopped"),
    }

    if opts.json {
        let payload = serde_json::json!({
            "managed": report.managed,
            "diagnostics": report.diagnostics,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        print_diagnostics(&report.diagnostics);
        if let Some(refreshed) = &report.managed {
            let dropped = managed.len() - refreshed.len();
            println!("{} buckets present, {dropped} dropped", refreshed.len());
        }
    }
    Ok(exit_code_for(&report.diagnostics))
}

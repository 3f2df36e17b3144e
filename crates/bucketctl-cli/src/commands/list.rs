use super::{exit_code_for, json_pretty, make_store, print_diagnostics, GlobalOpts};
use bucketctl_core::Lister;

pub fn run(opts: &GlobalOpts) -> Result<u8, String> {
    let store = make_store(opts)?;
    let report = Lister::new(&store).list();

    if opts.json {
        let payload = serde_json::json!({
            "buckets": report.buckets,
            "diagnostics": report.diagnostics,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        print_diagnostics(&report.diagnostics);
        if report.buckets.is_empty() && report.diagnostics.is_empty() {
            println!("no buckets found");
        } else if !report.buckets.is_empty() {
            println!("{:<40} CREATED", "NAME");
            for bucket in &report.buckets {
                println!("{:<40} {}", bucket.name, bucket.creation_date);
            }
        }
    }
    Ok(exit_code_for(&report.diagnostics))
}

use anyhow::Result;

use crate::commands::{CommandReport, guard_for, status};
use crate::workorder::config::load_config;
use crate::workorder::paths::resolve_paths;
use crate::workorder::persist::LoadState;

#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    pub strict: bool,
}

pub fn run(opts: &VerifyOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config()?;
    let mut report = CommandReport::new("verify");
    report.detail(format!("db_path={}", paths.db_path.display()));

    match guard_for(&paths, &cfg).inspect() {
        LoadState::Missing => {
            if opts.strict {
                report.issue("store file missing");
            } else {
                report.detail("store file missing; a fresh store would be used");
            }
        }
        LoadState::Unreadable(reason) => report.issue(format!("store unreadable: {reason}")),
        LoadState::Loaded(store) => {
            let issues = store.validate();
            if issues.is_empty() {
                report.detail("invariants: ok");
            }
            for issue in issues {
                report.issue(issue.to_string());
            }
            status::store_summary(&mut report, &store);
        }
    }

    if opts.strict && !paths.output_dir.exists() {
        report.issue(format!(
            "missing output dir ({})",
            paths.output_dir.display()
        ));
    }
    if opts.strict && !report.ok {
        report.issue("strict verify failed");
    }

    Ok(report)
}

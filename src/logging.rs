use std::env;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const DEFAULT_LOG_LEVEL: &str = "warn";

fn resolve_level(flag: Option<&str>) -> String {
    if let Some(level) = flag.map(str::trim).filter(|l| !l.is_empty()) {
        return level.to_string();
    }
    match env::var("OSREC_LOG") {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => DEFAULT_LOG_LEVEL.to_string(),
    }
}

/// Install the stderr subscriber. Stdout is reserved for command reports.
pub fn init(flag: Option<&str>) {
    let level = resolve_level(flag);
    let filter =
        EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::resolve_level;

    #[test]
    fn explicit_flag_wins() {
        assert_eq!(resolve_level(Some("debug")), "debug");
        assert_eq!(resolve_level(Some(" info ")), "info");
    }
}

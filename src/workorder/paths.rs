use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct OsrecPaths {
    pub home: PathBuf,
    pub db_path: PathBuf,
    pub output_dir: PathBuf,
    pub logs_dir: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_home() -> Result<PathBuf> {
    match env::var("OSREC_HOME") {
        Ok(v) if !v.trim().is_empty() => Ok(PathBuf::from(v.trim())),
        _ => Ok(required_home_dir()?.join("osrec")),
    }
}

pub fn resolve_paths() -> Result<OsrecPaths> {
    let home = resolve_home()?;

    let db_path = env_or_default_path("OSREC_DB_PATH", home.join("banco_dados.json"));
    let output_dir = env_or_default_path("OSREC_OUTPUT_DIR", home.join("OS_Geradas"));
    let logs_dir = env_or_default_path("OSREC_LOGS_DIR", home.join("logs"));

    Ok(OsrecPaths {
        home,
        db_path,
        output_dir,
        logs_dir,
    })
}

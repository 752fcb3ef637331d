use std::path::PathBuf;
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the config file path: `<exe_dir>/config.json`
pub fn get_config_path() -> PathBuf {
    get_exe_dir().join("config.json")
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Returns the geometry cache dump path: `<exe_dir>/logs/cache/cache.cache`
pub fn get_cache_dump_path() -> PathBuf {
    get_logs_dir().join("cache").join("cache.cache")
}

/// Returns the screenshots directory: `<exe_dir>/screenshots/`
pub fn get_screenshots_dir() -> PathBuf {
    get_exe_dir().join("screenshots")
}

/// Returns the corpus data directory: `<exe_dir>/config/data/`
pub fn get_corpus_data_dir() -> PathBuf {
    get_exe_dir().join("config").join("data")
}

/// Returns the analysis export directory: `<exe_dir>/config/analysis/`
pub fn get_analysis_dir() -> PathBuf {
    get_exe_dir().join("config").join("analysis")
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir().join("cache"))?;
    std::fs::create_dir_all(get_screenshots_dir())?;
    std::fs::create_dir_all(get_corpus_data_dir())?;
    std::fs::create_dir_all(get_analysis_dir())?;
    Ok(())
}

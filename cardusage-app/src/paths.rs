use directories::ProjectDirs;
use std::path::PathBuf;

pub fn data_root() -> PathBuf {
    if let Some(pd) = ProjectDirs::from("com", "cardusage", "CardUsage") {
        pd.data_dir().to_path_buf()
    } else {
        // Fallback: current dir
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }
}

pub fn default_db_file() -> PathBuf {
    data_root().join("cards_in_use.sqlite3")
}

pub fn default_report_file() -> PathBuf {
    data_root().join("cards_in_use.md")
}

use anyhow::{bail, Context, Result};
use console::style;
use earmark_config::ConfigManager;
use earmark_core::{AudioBook, BookId, BookStore, JsonBookStore};
use std::path::{Path, PathBuf};

/// File extensions treated as part of a book
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "m4a", "m4b", "aac", "ogg", "oga", "opus", "flac", "wav",
];

/// Lists the audio files of a book directory in playback order
///
/// Playback order is file name order, which is how ripped and downloaded
/// books number their parts.
pub fn collect_audio_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read book directory {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.context("Failed to read directory entry")?.path();
        if path.is_file() && is_audio_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Identifies a book by its canonical directory
pub fn book_id_for(dir: &Path) -> Result<BookId> {
    let dir = dir
        .canonicalize()
        .with_context(|| format!("Book directory not found: {}", dir.display()))?;
    Ok(BookId::from_path(&dir))
}

/// Scans `dir` and carries over whatever was saved for it last time
pub fn open_book(dir: &Path, store: &dyn BookStore) -> Result<AudioBook> {
    let id = book_id_for(dir)?;
    let files = collect_audio_files(dir)?;
    if files.is_empty() {
        bail!("No audio files found in {}", dir.display());
    }

    let title = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("Untitled")
        .to_string();
    let mut book = AudioBook::with_id(id, title, files).context("Failed to build book")?;

    match store.load(&id) {
        Ok(Some(saved)) => {
            book.adopt_progress(&saved);
            log::info!("Resuming '{}' at {:?}", book.title(), book.position());
        }
        Ok(None) => log::info!("No saved position for '{}'", book.title()),
        Err(e) => log::warn!("Ignoring saved state for '{}': {}", book.title(), e),
    }

    Ok(book)
}

/// Show files, known lengths and the saved position of a book
pub fn show_book_info(dir: &Path, positions_dir: &Path) -> Result<()> {
    let store = JsonBookStore::new(positions_dir);
    let book = open_book(dir, &store)?;
    let position = book.position();

    println!("\n{}", style(book.title()).bold().cyan());
    println!("{}", "=".repeat(60));

    for (index, file) in book.files().iter().enumerate() {
        let marker = if index == position.file_index { ">" } else { " " };
        let length = file
            .duration()
            .map(|d| d.as_hms())
            .unwrap_or_else(|| "--:--:--".to_string());
        let name = file
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("?");
        println!(" {} {:>3}. {}  {}", marker, index + 1, length, name);
    }
    println!();

    match book.elapsed() {
        Ok(elapsed) => match book.total_duration() {
            Some(total) => println!("  Listened: {} of {}", elapsed.as_hms(), total.as_hms()),
            None => println!("  Listened: {}", elapsed.as_hms()),
        },
        Err(_) => println!(
            "  Position: file {} at {}",
            position.file_index + 1,
            position.offset.as_hms()
        ),
    }

    let missing = book.files_with_no_duration().count();
    if missing > 0 {
        println!(
            "  {} file(s) not measured yet; they are probed on the next play",
            style(missing).yellow()
        );
    }

    Ok(())
}

/// Forget the saved position of a book
pub fn forget_book(dir: &Path, positions_dir: &Path) -> Result<()> {
    let store = JsonBookStore::new(positions_dir);
    let path = store.path_for(&book_id_for(dir)?);

    if !path.exists() {
        println!("Nothing saved for {}", dir.display());
        return Ok(());
    }

    std::fs::remove_file(&path)
        .with_context(|| format!("Failed to remove {}", path.display()))?;
    println!("{} Forgot saved position", style("✓").green().bold());
    Ok(())
}

pub fn config_init(manager: &ConfigManager) -> Result<()> {
    if manager.initialize().context("Failed to write config")? {
        println!(
            "{} Created {}",
            style("✓").green().bold(),
            manager.config_path().display()
        );
    } else {
        println!("Config already exists at {}", manager.config_path().display());
    }
    Ok(())
}

pub fn config_show(manager: &ConfigManager) -> Result<()> {
    let config = manager
        .load_with_env_overrides()
        .context("Failed to load configuration")?;

    println!("\n{}", style("Player").bold());
    println!("  Jump back:         {} ms", config.player.jump_back_ms);
    println!("  Playback speed:    {:.2}x", config.player.playback_speed);
    println!("  Progress interval: {} ms", config.player.progress_interval_ms);
    println!("  Stop on face down: {}", config.player.stop_on_face_down);
    println!("  Pitch correction:  {}", config.player.pitch_correction);

    println!("\n{}", style("Storage").bold());
    println!(
        "  Positions dir:     {}",
        manager.positions_dir(&config).display()
    );

    if let Err(errors) = config.validate() {
        println!();
        for error in errors {
            println!("  {} {}", style("!").yellow().bold(), error);
        }
    }
    Ok(())
}

pub fn config_path(manager: &ConfigManager) -> Result<()> {
    println!("{}", manager.config_path().display());
    Ok(())
}

pub fn config_reset(manager: &ConfigManager) -> Result<()> {
    manager.reset().context("Failed to reset config")?;
    println!(
        "{} Restored defaults in {}",
        style("✓").green().bold(),
        manager.config_path().display()
    );
    Ok(())
}

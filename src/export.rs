use anyhow::Result;
use std::io::Write;
use std::path::Path;

use crate::models::Flashcard;

// Anki-importable CSV: header row, then one term,definition row per card
pub fn write_csv<W: Write>(flashcards: &[Flashcard], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["term", "definition"])?;
    for card in flashcards {
        csv_writer.write_record([card.term.as_str(), card.definition.as_str()])?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn export_to_file(flashcards: &[Flashcard], output_file: &Path) -> Result<()> {
    if let Some(parent) = output_file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| anyhow::anyhow!("cannot create directory {}: {}", parent.display(), e))?;
        }
    }

    let file = std::fs::File::create(output_file)
        .map_err(|e| anyhow::anyhow!("cannot create output file {}: {}", output_file.display(), e))?;
    write_csv(flashcards, file)?;

    tracing::info!("exported {} flashcards to {}", flashcards.len(), output_file.display());
    Ok(())
}

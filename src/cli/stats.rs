use std::path::PathBuf;

use tabled::Table;

use crate::{Res, info, management::TrackStore, utils, warning};

/// `stats` command: table of the most played tracks.
pub async fn stats(store_path: PathBuf, search: Option<String>, limit: usize) -> Res<()> {
    if !store_path.exists() {
        warning!(
            "No plays recorded yet, {} does not exist. Run spintally track first.",
            store_path.display()
        );
        return Ok(());
    }

    let store = TrackStore::open(&store_path).await?;
    let rows = utils::top_tracks(store.records(), search.as_deref(), limit);
    if rows.is_empty() {
        warning!("No matching tracks.");
        return Ok(());
    }

    println!("{}", Table::new(rows));

    let total: u64 = store.records().iter().map(|r| r.play_count).sum();
    info!("{} plays across {} tracks", total, store.len());
    Ok(())
}

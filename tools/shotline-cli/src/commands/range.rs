//! Look up a shot in a range table.

use std::path::PathBuf;

use shotline_shot_model::range::ShotRangeTable;

pub fn run(csv: PathBuf, shot_key: String) -> anyhow::Result<()> {
    let table = ShotRangeTable::from_path(&csv)
        .map_err(|e| anyhow::anyhow!("Failed to read range table: {e}"))?;

    match table.resolve(&shot_key)? {
        Some(range) => {
            println!("Shot: {shot_key}");
            println!("  Start: {}", range.start);
            println!("  End: {}", range.end);
            println!("  Step: {}", range.step);
        }
        None => println!("Shot {shot_key} not found in {} ({} rows)", csv.display(), table.len()),
    }
    Ok(())
}

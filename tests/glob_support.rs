//! Integration tests for input file resolution.

use rowpipe::io::glob::{expand_glob, is_glob_pattern, resolve_inputs};
use rowpipe::testing::{TempDirPath, write_temp_file};
use std::fs::create_dir_all;

#[test]
fn test_is_glob_pattern() {
    assert!(is_glob_pattern("data/*.csv"));
    assert!(is_glob_pattern("part-?.csv"));
    assert!(is_glob_pattern("part-[0-9].csv"));
    assert!(!is_glob_pattern("data/rows.csv"));
}

#[test]
fn test_expand_glob_sorted_files_only() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    write_temp_file(&dir, "b.csv", "2")?;
    write_temp_file(&dir, "a.csv", "1")?;
    write_temp_file(&dir, "c.txt", "3")?;
    create_dir_all(dir.path().join("d.csv"))?;

    let pattern = format!("{}/*.csv", dir.path().display());
    let files = expand_glob(&pattern)?;
    let names: Vec<_> = files
        .iter()
        .filter_map(|p| p.file_name()?.to_str().map(str::to_string))
        .collect();
    assert_eq!(names, vec!["a.csv", "b.csv"]);
    Ok(())
}

#[test]
fn test_resolve_inputs() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let single = write_temp_file(&dir, "rows.csv", "x")?;
    let spec = single.display().to_string();
    assert_eq!(resolve_inputs(&spec)?, vec![single.clone()]);

    let missing = dir.file_path("missing.csv").display().to_string();
    assert!(resolve_inputs(&missing).is_err());

    let no_match = format!("{}/*.parquet", dir.path().display());
    let err = resolve_inputs(&no_match).expect_err("nothing matches");
    assert!(err.to_string().contains("no files found"));
    Ok(())
}

#[test]
fn test_invalid_pattern() {
    assert!(expand_glob("[unclosed").is_err());
}

use clap::Args;
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::batch::Summary;

#[derive(Args, Clone)]
pub struct SortArgs {
    /// Directory holding the images to sort
    #[arg(long)]
    pub input: String,
    /// Classification report (default: <input>/text.txt)
    #[arg(long)]
    pub report: Option<String>,
    /// Destination folder for label "0". For SEPT7 classification use
    /// e.g. SEPT7_positive.
    #[arg(long, default_value = "single")]
    pub zero_dir: String,
    /// Destination folder for label "1". For SEPT7 classification use
    /// e.g. SEPT7_negative.
    #[arg(long, default_value = "clump")]
    pub one_dir: String,
}

/// One record per relevant report line: a path ending in .tif, a dash-style
/// delimiter, then the label token.
const REPORT_RE: &str = r"^(?P<path>\S*\.tif)\s*(?:-\s*)?(?P<label>\S+)$";

/// Parse the classifier report into filename -> label. Lines without "tif"
/// are ignored. Relevant lines that do not match the record format are
/// returned with their 1-based line numbers instead of aborting the parse.
/// A repeated filename keeps the later label.
fn parse_report(
    path: &Path,
) -> Result<(HashMap<String, String>, Vec<(usize, String)>), Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)
        .map_err(|e| format!("Cannot read report {}: {}", path.display(), e))?;
    let re = Regex::new(REPORT_RE)?;

    let mut predictions = HashMap::new();
    let mut malformed = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if !line.contains("tif") {
            continue;
        }
        match re.captures(line) {
            Some(cap) => {
                let name = cap["path"].rsplit('/').next().unwrap_or(&cap["path"]).to_string();
                predictions.insert(name, cap["label"].to_string());
            }
            None => malformed.push((line_no + 1, line.to_string())),
        }
    }
    Ok((predictions, malformed))
}

pub fn run(args: SortArgs, progress: impl Fn(f64, &str)) -> Result<(), Box<dyn std::error::Error>> {
    let input = Path::new(&args.input);
    if !input.is_dir() {
        return Err(format!("Input directory not found: {}", input.display()).into());
    }

    let report = args
        .report
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| input.join("text.txt"));
    let (predictions, malformed) = parse_report(&report)?;
    eprintln!(
        "Report {}: {} prediction(s), {} malformed line(s)",
        report.display(),
        predictions.len(),
        malformed.len()
    );

    let zero_dir = input.join(&args.zero_dir);
    let one_dir = input.join(&args.one_dir);
    fs::create_dir(&zero_dir)
        .map_err(|e| format!("Cannot create {}: {}", zero_dir.display(), e))?;
    fs::create_dir(&one_dir)
        .map_err(|e| format!("Cannot create {}: {}", one_dir.display(), e))?;

    let mut summary = Summary::default();
    for (line_no, line) in &malformed {
        summary.warn(format!("Malformed report line {}: {}", line_no, line));
    }

    let mut entries: Vec<(String, PathBuf)> = fs::read_dir(input)?
        .filter_map(|e| {
            let e = e.ok()?;
            if e.file_type().ok()?.is_file() {
                Some((e.file_name().to_string_lossy().into_owned(), e.path()))
            } else {
                None
            }
        })
        .collect();
    entries.sort();

    let total = entries.len();
    let mut copied_zero = 0usize;
    let mut copied_one = 0usize;

    for (i, (name, path)) in entries.iter().enumerate() {
        match predictions.get(name).map(String::as_str) {
            Some("0") => match fs::copy(path, zero_dir.join(name)) {
                Ok(_) => {
                    copied_zero += 1;
                    summary.ok();
                }
                Err(e) => summary.fail(name, e),
            },
            Some("1") => match fs::copy(path, one_dir.join(name)) {
                Ok(_) => {
                    copied_one += 1;
                    summary.ok();
                }
                Err(e) => summary.fail(name, e),
            },
            Some(label) => {
                summary.warn(format!("{}: unrecognised label {:?}, left in place", name, label));
                summary.skip();
            }
            None => summary.skip(),
        }
        if total > 0 {
            progress(
                (i + 1) as f64 / total as f64,
                &format!("Sorting {}/{}", i + 1, total),
            );
        }
    }

    eprintln!(
        "Copied {} file(s) to {}, {} to {}",
        copied_zero,
        zero_dir.display(),
        copied_one,
        one_dir.display()
    );
    progress(1.0, &format!("Sorted {}", input.display()));
    summary.finish("sort")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_for(dir: &Path) -> SortArgs {
        SortArgs {
            input: dir.to_string_lossy().into_owned(),
            report: None,
            zero_dir: "single".to_string(),
            one_dir: "clump".to_string(),
        }
    }

    #[test]
    fn parser_keys_on_the_filename_and_keeps_the_last_label() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("text.txt");
        fs::write(
            &report,
            "folder/a.tif - 0\n\
             prediction run header\n\
             folder/sub/b.tif - 1\n\
             c.tif garbled tif line -\n\
             folder/a.tif - 1\n",
        )
        .unwrap();

        let (map, malformed) = parse_report(&report).unwrap();
        assert_eq!(map.get("a.tif").map(String::as_str), Some("1"));
        assert_eq!(map.get("b.tif").map(String::as_str), Some("1"));
        assert_eq!(map.len(), 2);
        assert_eq!(malformed.len(), 1);
        assert_eq!(malformed[0].0, 4);
    }

    #[test]
    fn files_move_by_label_and_unlisted_files_stay_put() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.tif"), b"aaa").unwrap();
        fs::write(dir.path().join("b.tif"), b"bbb").unwrap();
        fs::write(dir.path().join("c.tif"), b"ccc").unwrap();
        fs::write(
            dir.path().join("text.txt"),
            "folder/a.tif - 0\nfolder/b.tif - 1\n",
        )
        .unwrap();

        run(args_for(dir.path()), |_, _| {}).unwrap();

        assert_eq!(fs::read(dir.path().join("single").join("a.tif")).unwrap(), b"aaa");
        assert_eq!(fs::read(dir.path().join("clump").join("b.tif")).unwrap(), b"bbb");
        assert!(!dir.path().join("single").join("c.tif").exists());
        assert!(!dir.path().join("clump").join("c.tif").exists());
        // copies, not moves
        assert!(dir.path().join("a.tif").is_file());
        assert!(dir.path().join("b.tif").is_file());
        assert!(dir.path().join("c.tif").is_file());
    }

    #[test]
    fn unrecognised_labels_leave_the_file_in_place() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.tif"), b"aaa").unwrap();
        fs::write(dir.path().join("text.txt"), "folder/a.tif - maybe\n").unwrap();

        run(args_for(dir.path()), |_, _| {}).unwrap();

        assert!(dir.path().join("a.tif").is_file());
        assert!(!dir.path().join("single").join("a.tif").exists());
        assert!(!dir.path().join("clump").join("a.tif").exists());
    }

    #[test]
    fn existing_destination_directory_is_a_run_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("text.txt"), "").unwrap();
        fs::create_dir(dir.path().join("single")).unwrap();
        let err = run(args_for(dir.path()), |_, _| {}).unwrap_err();
        assert!(err.to_string().contains("Cannot create"));
    }

    #[test]
    fn missing_report_is_a_run_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(args_for(dir.path()), |_, _| {}).unwrap_err();
        assert!(err.to_string().contains("Cannot read report"));
    }
}

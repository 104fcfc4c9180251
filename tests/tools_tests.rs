//! Path, filter, and naming helpers.

use ledgerscan::engine::tools::{
    ExtensionFilter, extension_of, mtime_ns, path_relative_to, path_to_db_string,
    sanitize_for_filename, subtree_output_path,
};
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};

#[test]
fn test_path_relative_under_base() {
    let rel = path_relative_to(Path::new("/r/alpha/x.pdf"), Path::new("/r")).unwrap();
    assert_eq!(path_to_db_string(&rel), "alpha/x.pdf");
    assert_eq!(path_relative_to(Path::new("/other/x"), Path::new("/r")), None);
}

#[test]
fn test_path_to_db_string_normalizes_backslashes() {
    assert_eq!(path_to_db_string(Path::new(r"a\b\c.txt")), "a/b/c.txt");
}

#[test]
fn test_extension_lowercased() {
    assert_eq!(extension_of(Path::new("/x/Scan.PDF")), "pdf");
    assert_eq!(extension_of(Path::new("/x/README")), "");
}

#[test]
fn test_extension_filter() {
    let all = ExtensionFilter::new(&[], &[]);
    assert!(all.accepts("pdf"));
    assert!(all.accepts(""));

    let f = ExtensionFilter::new(&[".PDF".to_string(), " Tif ".to_string()], &[]);
    assert!(f.accepts("pdf"));
    assert!(f.accepts("tif"));
    assert!(!f.accepts("txt"));

    let f = ExtensionFilter::new(&[], &["tmp".to_string()]);
    assert!(!f.accepts("tmp"));
    assert!(f.accepts("pdf"));
}

#[test]
fn test_sanitize_for_filename() {
    assert_eq!(sanitize_for_filename(" my dir "), "my_dir");
    assert_eq!(sanitize_for_filename("a<b>c:d|e?f*g"), "a_b_c_d_e_f_g");
    assert_eq!(sanitize_for_filename("CON"), "CON_dir");
    assert_eq!(sanitize_for_filename("lpt1"), "lpt1_dir");
    assert_eq!(sanitize_for_filename("console"), "console");
}

#[test]
fn test_subtree_output_path() {
    assert_eq!(
        subtree_output_path(Path::new("out/inv.csv"), "Case Files"),
        PathBuf::from("out").join("inv_Case_Files.csv")
    );
    assert_eq!(
        subtree_output_path(Path::new("inv.csv"), "nul"),
        PathBuf::from(".").join("inv_nul_dir.csv")
    );
}

#[test]
fn test_mtime_ns_before_epoch_is_negative() {
    assert_eq!(mtime_ns(UNIX_EPOCH + Duration::from_nanos(5)), 5);
    assert_eq!(mtime_ns(UNIX_EPOCH - Duration::from_secs(1)), -1_000_000_000);
}

#[test]
fn test_summary_line_lists_every_counter() {
    use ledgerscan::ScanTally;
    use ledgerscan::inventory::tally_line;

    colored::control::set_override(false);
    let tally = ScanTally {
        processed: 9,
        skipped: 4,
        filtered: 3,
        errors: 2,
        has_text: 5,
        image_only: 1,
        unresolved: 2,
        ..Default::default()
    };
    assert_eq!(
        tally_line(&tally),
        "Processed: 9 | Skipped: 4 | Filtered: 3 | Errors: 2 | Text: 5 / Image: 1 / Unresolved: 2"
    );
}

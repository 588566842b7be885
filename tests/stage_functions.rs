// tests/stage_functions.rs

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use s2flow::config::ConfigFile;
use s2flow::errors::ErrorKind;
use s2flow::stage::command::{render_template, shell_quote};
use s2flow::stage::paths::{
    cloud_mask_output_path, item_dir_name, l1c_dir, l2a_dir, l2a_output_path, rebase,
};
use s2flow::stage::{Credentials, Retrying, StageFunction, StageRegistry, ZipUnpack};
use s2flow::types::{Stage, StageValue};
use tempfile::tempdir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

type TestResult = Result<(), Box<dyn std::error::Error>>;

const PRODUCT: &str = "S2A_MSIL1C_20200101T000000_N0208_R000_T31UFT_20200101T000000";

fn write_product_zip(path: &Path, safe: &str) -> TestResult {
    let mut zip = ZipWriter::new(File::create(path)?);
    let opts = SimpleFileOptions::default();
    zip.add_directory(format!("{safe}/"), opts)?;
    zip.start_file(format!("{safe}/MTD_MSIL1C.xml"), opts)?;
    zip.write_all(b"<metadata/>")?;
    zip.add_directory(format!("{safe}/GRANULE/"), opts)?;
    zip.start_file(format!("{safe}/GRANULE/B01.jp2"), opts)?;
    zip.write_all(&[0u8; 64])?;
    zip.finish()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Unpack
// ---------------------------------------------------------------------------

#[test]
fn unpack_extracts_and_returns_safe_dir() -> TestResult {
    let dir = tempdir()?;
    let archive = dir.path().join("product.zip");
    let safe = format!("{PRODUCT}.SAFE");
    write_product_zip(&archive, &safe)?;

    let extract_root = dir.path().join("l1c");
    let unpack = ZipUnpack::new(&extract_root);
    let out = unpack
        .run("uuid-1", &StageValue::Path(archive))
        .map_err(|e| e.to_string())?;

    assert_eq!(out, extract_root.join("uuid-1").join(&safe));
    assert!(out.is_dir());
    assert_eq!(fs::read_to_string(out.join("MTD_MSIL1C.xml"))?, "<metadata/>");
    assert!(out.join("GRANULE").join("B01.jp2").is_file());
    Ok(())
}

#[test]
fn unpack_of_garbage_is_corrupt_archive() -> TestResult {
    let dir = tempdir()?;
    let archive = dir.path().join("broken.zip");
    fs::write(&archive, b"this is not a zip file")?;

    let unpack = ZipUnpack::new(dir.path().join("l1c"));
    match unpack.run("broken", &StageValue::Path(archive)) {
        Err(kind) => assert_eq!(kind.name(), "CorruptArchiveError"),
        Ok(p) => panic!("expected failure, got {p:?}"),
    }
    Ok(())
}

#[test]
fn unpack_of_missing_file_is_corrupt_archive() {
    let dir = tempdir().unwrap();
    let unpack = ZipUnpack::new(dir.path().join("l1c"));
    let result = unpack.run("gone", &StageValue::Path(dir.path().join("gone.zip")));
    assert!(matches!(result, Err(ErrorKind::CorruptArchive(_))));
}

#[test]
fn unpack_of_empty_archive_is_corrupt_archive() -> TestResult {
    let dir = tempdir()?;
    let archive = dir.path().join("empty.zip");
    ZipWriter::new(File::create(&archive)?).finish()?;

    let unpack = ZipUnpack::new(dir.path().join("l1c"));
    match unpack.run("empty", &StageValue::Path(archive)) {
        Err(ErrorKind::CorruptArchive(msg)) => assert!(msg.contains("no entries")),
        other => panic!("expected CorruptArchive, got {other:?}"),
    }
    Ok(())
}

#[test]
fn unpack_rejects_a_product_id_as_input() {
    let unpack = ZipUnpack::new("/unused");
    let result = unpack.run("A", &StageValue::Product("A".to_string()));
    assert!(matches!(result, Err(ErrorKind::Processing { status: None, .. })));
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

#[test]
fn item_dir_names_are_single_safe_components() {
    assert_eq!(item_dir_name("0a1b-2c3d"), "0a1b-2c3d");
    assert_eq!(item_dir_name("v1.2"), "v1.2");

    for (item, stem) in [("a/b\\c d", "a_b_c_d~"), ("..", "__~"), ("", "~")] {
        let name = item_dir_name(item);
        assert!(name.starts_with(stem), "{item:?} -> {name:?}");
        assert_eq!(name.len(), stem.len() + 16);
        assert!(!name.contains('/') && !name.contains('\\'));
    }
}

#[test]
fn sanitised_item_dirs_do_not_collide() {
    assert_ne!(item_dir_name("a/b"), item_dir_name("a_b"));
    assert_ne!(item_dir_name("a b"), item_dir_name("a/b"));
    assert_ne!(item_dir_name("."), item_dir_name("_"));
    assert_eq!(item_dir_name("a/b"), item_dir_name("a/b"));
}

#[test]
fn l2a_output_is_rebased_and_renamed() {
    let data = Path::new("/data");
    let input = l1c_dir(data).join("id").join(format!("{PRODUCT}.SAFE"));
    let out = l2a_output_path(&input, &l1c_dir(data), &l2a_dir(data));

    let expected_name = format!("{PRODUCT}.SAFE").replace("MSIL1C", "MSIL2A");
    assert_eq!(out, PathBuf::from("/data/l2a/id").join(expected_name));
}

#[test]
fn cloud_mask_output_is_a_tif() {
    let out = cloud_mask_output_path(
        Path::new("/data/l1c/id/X.SAFE"),
        Path::new("/data/l1c"),
        Path::new("/data/cloud_masks"),
    );
    assert_eq!(out, PathBuf::from("/data/cloud_masks/id/X.tif"));

    let out = cloud_mask_output_path(
        Path::new("/data/l1c/id/plain"),
        Path::new("/data/l1c"),
        Path::new("/data/cloud_masks"),
    );
    assert_eq!(out, PathBuf::from("/data/cloud_masks/id/plain.tif"));
}

#[test]
fn rebase_outside_root_keeps_file_name() {
    let out = rebase(Path::new("/elsewhere/X.SAFE"), Path::new("/data/l1c"), Path::new("/data/l2a"));
    assert_eq!(out, PathBuf::from("/data/l2a/X.SAFE"));
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

#[test]
fn templates_substitute_quoted_values() {
    let rendered = render_template(
        "tool --in {input} --out {output} --id {id}",
        &[("input", "/a b/x"), ("output", "/out"), ("id", "it's")],
    );
    if cfg!(windows) {
        return;
    }
    assert_eq!(rendered, r#"tool --in '/a b/x' --out /out --id 'it'\''s'"#);
}

#[test]
fn unknown_placeholders_are_left_alone() {
    let rendered = render_template("echo ${HOME} {nope} {id}", &[("id", "A")]);
    assert_eq!(rendered, "echo ${HOME} {nope} A");
}

#[test]
fn substituted_values_are_not_rescanned() {
    if cfg!(windows) {
        return;
    }
    let rendered = render_template(
        "run {id} {input}",
        &[("id", "{input}"), ("input", "/l1c/x y.SAFE")],
    );
    assert_eq!(rendered, "run '{input}' '/l1c/x y.SAFE'");

    let rendered = render_template("{a}{b}", &[("a", "{b}"), ("b", "x")]);
    assert_eq!(rendered, "'{b}'x");
}

#[test]
fn unclosed_braces_are_kept() {
    if cfg!(windows) {
        return;
    }
    assert_eq!(render_template("a { {id", &[("id", "A")]), "a { {id");
    assert_eq!(render_template("{{id}}", &[("id", "A")]), "{A}");
}

#[test]
fn plain_values_are_not_quoted() {
    if cfg!(windows) {
        return;
    }
    assert_eq!(shell_quote("/data/l1c/A.SAFE"), "/data/l1c/A.SAFE");
    assert_eq!(shell_quote(""), "''");
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// Fails with `kind` for the first `failures` calls, then succeeds.
struct Flaky {
    calls: Arc<AtomicUsize>,
    failures: usize,
    kind: ErrorKind,
}

impl StageFunction for Flaky {
    fn stage(&self) -> Stage {
        Stage::Acquire
    }

    fn run(&self, item: &str, _input: &StageValue) -> Result<PathBuf, ErrorKind> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            Err(self.kind.clone())
        } else {
            Ok(PathBuf::from(format!("/fake/{item}.zip")))
        }
    }
}

fn flaky(failures: usize, kind: ErrorKind) -> (Flaky, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (
        Flaky {
            calls: Arc::clone(&calls),
            failures,
            kind,
        },
        calls,
    )
}

#[test]
fn transient_failures_are_retried_until_success() {
    let (inner, calls) = flaky(2, ErrorKind::Transient("timeout".into()));
    let stage = Retrying::new(inner, 3, Duration::from_millis(1));

    let out = stage.run("A", &StageValue::Product("A".into()));
    assert_eq!(out, Ok(PathBuf::from("/fake/A.zip")));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(stage.stage(), Stage::Acquire);
}

#[test]
fn retries_are_bounded() {
    let (inner, calls) = flaky(10, ErrorKind::Transient("timeout".into()));
    let stage = Retrying::new(inner, 1, Duration::from_millis(1));

    let out = stage.run("A", &StageValue::Product("A".into()));
    assert!(matches!(out, Err(ErrorKind::Transient(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn permanent_failures_are_not_retried() {
    let (inner, calls) = flaky(10, ErrorKind::NotFound("gone".into()));
    let stage = Retrying::new(inner, 5, Duration::from_millis(1));

    let out = stage.run("A", &StageValue::Product("A".into()));
    assert!(matches!(out, Err(ErrorKind::NotFound(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[test]
fn registry_from_config_covers_every_stage() {
    let registry = StageRegistry::from_config(&ConfigFile::default(), Credentials::default());
    assert_eq!(registry.stages().collect::<Vec<_>>(), Stage::ALL.to_vec());
    for stage in Stage::ALL {
        assert_eq!(registry.get(stage).map(|f| f.stage()), Some(stage));
    }
}

#[test]
fn credentials_debug_hides_password() {
    let creds = Credentials::new("alice", "hunter2");
    let shown = format!("{creds:?}");
    assert!(shown.contains("alice"));
    assert!(!shown.contains("hunter2"));
}

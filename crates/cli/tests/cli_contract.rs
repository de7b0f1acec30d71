use assert_cmd::cargo::cargo_bin_cmd;
use pdf_viewer_download::testing::serve_once;
use pdf_viewer_render::engine::fixtures::pdf_with_pages;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

fn write_fixture(dir: &Path, name: &str, sizes: &[(f32, f32)]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, pdf_with_pages(sizes)).expect("fixture should be written");
    path
}

#[test]
fn info_emits_stable_json_contract() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_fixture(temp.path(), "small.pdf", &[(200.0, 300.0), (612.0, 792.0)]);

    let output = cargo_bin_cmd!("pdf-viewer")
        .arg("info")
        .arg(&pdf)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    assert_eq!(value["path"], Value::String(pdf.display().to_string()));
    assert_eq!(value["page_count"], 2);
    assert_eq!(value["first_page_size_pt"]["width"], 200.0);
    assert_eq!(value["first_page_size_pt"]["height"], 300.0);
}

#[test]
fn info_reports_empty_document() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_fixture(temp.path(), "empty.pdf", &[]);

    let output = cargo_bin_cmd!("pdf-viewer")
        .arg("info")
        .arg(&pdf)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let value: Value = serde_json::from_slice(&output).expect("stdout should contain valid json");
    assert_eq!(value["page_count"], 0);
    assert!(value["first_page_size_pt"].is_null());
}

#[test]
fn info_fails_for_missing_file() {
    cargo_bin_cmd!("pdf-viewer")
        .arg("info")
        .arg("/nonexistent/missing.pdf")
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn render_writes_png_per_page() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_fixture(temp.path(), "doc.pdf", &[(100.0, 200.0), (50.0, 50.0), (80.0, 40.0)]);
    let out_dir = temp.path().join("pages");

    cargo_bin_cmd!("pdf-viewer")
        .arg("render")
        .arg(&pdf)
        .arg("--output-dir")
        .arg(&out_dir)
        .arg("--scale")
        .arg("0.5")
        .arg("--pages")
        .arg("1,3")
        .env("PDF_VIEWER_CACHE_DIR", temp.path().join("cache"))
        .assert()
        .success()
        .stdout(predicate::str::contains("page-1.png").and(predicate::str::contains("page-3.png")));

    let first = image::open(out_dir.join("page-1.png")).expect("page 1 should be a readable image");
    assert_eq!((first.width(), first.height()), (50, 100));

    let third = image::open(out_dir.join("page-3.png")).expect("page 3 should be a readable image");
    assert_eq!((third.width(), third.height()), (40, 20));

    assert!(!out_dir.join("page-2.png").exists());
}

#[test]
fn render_rejects_out_of_range_page() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_fixture(temp.path(), "doc.pdf", &[(100.0, 100.0)]);

    cargo_bin_cmd!("pdf-viewer")
        .arg("render")
        .arg(&pdf)
        .arg("--output-dir")
        .arg(temp.path())
        .arg("--pages")
        .arg("2")
        .env("PDF_VIEWER_CACHE_DIR", temp.path().join("cache"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn render_downloads_remote_source() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let body = pdf_with_pages(&[(60.0, 90.0)]);
    let len = body.len() as u64;
    let url = serve_once(200, body, Some(len));
    let out_dir = temp.path().join("pages");
    let cache_dir = temp.path().join("cache");

    cargo_bin_cmd!("pdf-viewer")
        .arg("render")
        .arg(&url)
        .arg("--output-dir")
        .arg(&out_dir)
        .env("PDF_VIEWER_CACHE_DIR", &cache_dir)
        .assert()
        .success();

    assert!(cache_dir.join("downloaded_pdf.pdf").exists());
    let page = image::open(out_dir.join("page-1.png")).expect("page should be a readable image");
    assert_eq!((page.width(), page.height()), (60, 90));
}

#[test]
fn fetch_writes_output_file() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let body = b"%PDF-1.5 fetched bytes".to_vec();
    let url = serve_once(200, body.clone(), Some(body.len() as u64));
    let output = temp.path().join("fetched.pdf");

    cargo_bin_cmd!("pdf-viewer")
        .arg("fetch")
        .arg(&url)
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("fetched.pdf"));

    assert_eq!(fs::read(&output).expect("output should exist"), body);
}

#[test]
fn fetch_reports_http_errors() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let url = serve_once(404, Vec::new(), Some(0));

    cargo_bin_cmd!("pdf-viewer")
        .arg("fetch")
        .arg(&url)
        .arg("--output")
        .arg(temp.path().join("missing.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("HTTP 404"));
}

#[test]
fn invalid_environment_config_is_rejected() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let pdf = write_fixture(temp.path(), "doc.pdf", &[(100.0, 100.0)]);

    cargo_bin_cmd!("pdf-viewer")
        .arg("render")
        .arg(&pdf)
        .env("PDF_VIEWER_IO_WORKERS", "0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("pdf-viewer")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

use assert_cmd::Command;
use predicates::prelude::*;
use relocation_core::{capture, end_section, inject_here};
use std::io::Write;
use tempfile::NamedTempFile;

fn reloc() -> Command {
    Command::cargo_bin("reloc").unwrap()
}

fn page() -> String {
    format!(
        "<head>{}</head><body>{}{}</body>{}",
        inject_here("css").unwrap(),
        capture("css", "p{}").unwrap(),
        capture("javascript", "go();").unwrap(),
        inject_here("javascript").unwrap(),
    )
}

fn write_temp(contents: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn render_relocates_sections() {
    let input = write_temp(&page(), ".html");
    reloc()
        .arg("render")
        .arg(input.path())
        .assert()
        .success()
        .stdout("<head>p{}</head><body></body>go();");
}

#[test]
fn render_reads_stdin() {
    reloc()
        .args(["render", "-"])
        .write_stdin(page())
        .assert()
        .success()
        .stdout("<head>p{}</head><body></body>go();");
}

#[test]
fn render_with_externify_config() {
    let input = write_temp(&page(), ".html");
    let config = write_temp(
        "[pipeline]\nprocessors = [\"externify\"]\n\n[externify]\nurl_format = \"/x/{document}/{section}\"\n",
        ".toml",
    );
    reloc()
        .arg("--config")
        .arg(config.path())
        .args(["render", "--document", "home"])
        .arg(input.path())
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#"href="/x/home/css""#)
                .and(predicate::str::contains(r#"src="/x/home/javascript""#))
                .and(predicate::str::contains("go();").not()),
        );
}

#[test]
fn no_pipeline_skips_processors() {
    let input = write_temp(&page(), ".html");
    let config = write_temp("[pipeline]\nprocessors = [\"externify\"]\n", ".toml");
    reloc()
        .arg("-c")
        .arg(config.path())
        .args(["render", "--no-pipeline"])
        .arg(input.path())
        .assert()
        .success()
        .stdout("<head>p{}</head><body></body>go();");
}

#[test]
fn split_json_lists_sections() {
    let input = write_temp(&page(), ".html");
    let output = reloc()
        .args(["split", "--json"])
        .arg(input.path())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value["main"], "<head>p{}</head><body></body>go();");
    assert_eq!(value["sections"]["css"], "p{}");
    assert_eq!(value["sections"]["javascript"], "go();");
    assert_eq!(value["stored"], serde_json::json!([]));
}

#[test]
fn section_prints_one_section() {
    let input = write_temp(&page(), ".html");
    reloc()
        .arg("section")
        .arg(input.path())
        .arg("javascript")
        .assert()
        .success()
        .stdout("go();");
}

#[test]
fn missing_section_fails() {
    let input = write_temp(&page(), ".html");
    reloc()
        .arg("section")
        .arg(input.path())
        .arg("fonts")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no section named \"fonts\""));
}

#[test]
fn check_reports_counts() {
    let input = write_temp(&page(), ".html");
    reloc()
        .arg("check")
        .arg(input.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Valid: 6 marker(s), 2 section(s)"));
}

#[test]
fn check_reports_unbalanced_end() {
    let input = write_temp(&format!("text{}", end_section()), ".html");
    reloc()
        .args(["check", "--json"])
        .arg(input.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains(r#""kind":"UnbalancedBlock""#));
}

#[test]
fn allow_unclosed_flag() {
    let doc = format!("main{}", relocation_core::begin_section("s").unwrap());
    let input = write_temp(&doc, ".html");
    reloc()
        .arg("render")
        .arg(input.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("never closed"));
    reloc()
        .args(["--allow-unclosed", "render"])
        .arg(input.path())
        .assert()
        .success()
        .stdout("main");
}

#[test]
fn emit_markers() {
    reloc()
        .args(["emit", "inject", "css"])
        .assert()
        .success()
        .stdout(inject_here("css").unwrap());
    reloc()
        .args(["emit", "end"])
        .assert()
        .success()
        .stdout(end_section());
}

#[test]
fn emit_rejects_bad_name() {
    reloc()
        .args(["emit", "start", "a>b"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must not contain"));
}

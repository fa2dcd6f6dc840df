use predicates::prelude::*;
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use tempfile::tempdir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

fn docx(lines: &[&str]) -> Vec<u8> {
    let body = lines
        .iter()
        .map(|line| format!("<w:p><w:r><w:t>{line}</w:t></w:r></w:p>"))
        .collect::<String>();
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{body}</w:body></w:document>"
    );
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("word/document.xml", SimpleFileOptions::default())
        .expect("start entry");
    writer.write_all(xml.as_bytes()).expect("write entry");
    writer.finish().expect("finish zip").into_inner()
}

fn osrec(root: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("osrec");
    cmd.current_dir(root)
        .env("OSREC_HOME", root)
        .env("OSREC_DB_PATH", root.join("banco_dados.json"))
        .env("OSREC_OUTPUT_DIR", root.join("OS_Geradas"))
        .env("OSREC_LOGS_DIR", root.join("logs"))
        .env("OSREC_CONFIG_PATH", root.join("osrec.toml"))
        .env_remove("OSREC_ID_MODE")
        .env_remove("OSREC_SCAN_CONCURRENCY")
        .env_remove("OSREC_EXTENSIONS")
        .env_remove("OSREC_MAX_FILE_BYTES")
        .env_remove("OSREC_PROGRESS_EVERY")
        .env_remove("OSREC_WIPE_THRESHOLD")
        .env_remove("OSREC_SEED_LAST_NUMBER")
        .env_remove("OSREC_LOG");
    cmd
}

fn write_documents(root: &Path) {
    let out = root.join("OS_Geradas");
    fs::create_dir_all(&out).expect("mkdir output");
    fs::write(
        out.join("OS 3501 - Maria - HP.docx"),
        docx(&["Cliente: Maria Silva", "Telefone: (11) 98765-4321", "Total: R$ 150,00"]),
    )
    .expect("write 3501");
    fs::write(out.join("3502.docx"), b"definitely not a zip archive").expect("write 3502");
    fs::write(out.join("~$3501.docx"), b"lock").expect("write lock file");
}

#[test]
fn scan_recovers_documents_and_second_scan_adds_nothing() {
    let tmp = tempdir().expect("tempdir");
    write_documents(tmp.path());

    osrec(tmp.path())
        .arg("scan")
        .assert()
        .success()
        .stdout(predicate::str::contains("added=2"))
        .stdout(predicate::str::contains("added_ids=3501,3502"))
        .stdout(predicate::str::contains("duplicates_dropped=0"))
        .stderr(predicate::str::contains("progress: 2/2"));

    let raw = fs::read_to_string(tmp.path().join("banco_dados.json")).expect("read store");
    let store: serde_json::Value = serde_json::from_str(&raw).expect("parse store");
    assert_eq!(store["ultimo_numero"], 3502);
    assert_eq!(store["historico"][0]["os"], 3501);
    assert_eq!(store["historico"][0]["cliente"], "Maria Silva");
    assert_eq!(store["historico"][0]["valor"], "R$ 150,00");
    assert_eq!(store["historico"][1]["cliente"], "Cliente não identificado");
    assert_eq!(store["historico"][1]["valor"], "R$ 0,00");

    osrec(tmp.path())
        .arg("scan")
        .assert()
        .success()
        .stdout(predicate::str::contains("no new records"));
    assert_eq!(
        raw,
        fs::read_to_string(tmp.path().join("banco_dados.json")).expect("reread store")
    );

    let audit = fs::read_to_string(tmp.path().join("logs/audit.log")).expect("audit log");
    assert_eq!(audit.lines().count(), 2);
}

#[test]
fn scan_keeps_existing_records_and_raises_counter() {
    let tmp = tempdir().expect("tempdir");
    write_documents(tmp.path());
    fs::write(
        tmp.path().join("banco_dados.json"),
        r#"{"ultimo_numero": 3501, "historico": [
            {"os": 3501, "data": "01/03/2024", "cliente": "Registro Original", "telefone": "",
             "impressora": "Epson", "orcamento": "", "valor": "R$ 80,00", "obs": "", "status": "Aprovado"}
        ]}"#,
    )
    .expect("seed store");

    osrec(tmp.path())
        .arg("scan")
        .assert()
        .success()
        .stdout(predicate::str::contains("added_ids=3502"));

    let raw = fs::read_to_string(tmp.path().join("banco_dados.json")).expect("read store");
    let store: serde_json::Value = serde_json::from_str(&raw).expect("parse store");
    assert_eq!(store["ultimo_numero"], 3502);
    assert_eq!(store["historico"][0]["cliente"], "Registro Original");
    assert_eq!(store["historico"][0]["status"], "Aprovado");
}

#[test]
fn dry_run_reports_without_writing() {
    let tmp = tempdir().expect("tempdir");
    write_documents(tmp.path());

    osrec(tmp.path())
        .args(["scan", "--dry-run", "--concurrency", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("would_add_ids=3501,3502"));
    assert!(!tmp.path().join("banco_dados.json").exists());
}

#[test]
fn missing_output_dir_fails_with_code() {
    let tmp = tempdir().expect("tempdir");

    osrec(tmp.path())
        .arg("scan")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("E101_SCAN_DIR_MISSING"));
}

#[test]
fn scan_one_and_locate_report_a_single_ticket() {
    let tmp = tempdir().expect("tempdir");
    write_documents(tmp.path());

    osrec(tmp.path())
        .args(["scan-one", "--id", "3501"])
        .assert()
        .success()
        .stdout(predicate::str::contains("client=Maria Silva (content)"))
        .stdout(predicate::str::contains("in_store=false"));

    osrec(tmp.path())
        .args(["scan-one", "--id", "42"])
        .assert()
        .code(2);

    osrec(tmp.path())
        .args(["locate", "--id", "3502"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3502.docx"));
}

#[test]
fn deleted_documents_are_not_recovered_again() {
    let tmp = tempdir().expect("tempdir");
    write_documents(tmp.path());

    osrec(tmp.path())
        .args(["locate", "--id", "3502", "--delete"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted=1"));
    assert!(!tmp.path().join("OS_Geradas/3502.docx").exists());

    osrec(tmp.path())
        .args(["locate", "--id", "3502", "--delete"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted=0"));

    osrec(tmp.path())
        .arg("scan")
        .assert()
        .success()
        .stdout(predicate::str::contains("added_ids=3501\n"));
}

#[test]
fn invalid_concurrency_flag_is_an_error() {
    let tmp = tempdir().expect("tempdir");
    write_documents(tmp.path());

    osrec(tmp.path())
        .args(["scan", "--concurrency", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid --concurrency"));
}

// End-to-end tests of the `nfaudit` binary: exit codes, the --json stdout
// contract and the report files.
//
// Run with: cargo test -p nfaudit-cli --test cli_tests -- --nocapture

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use rust_xlsxwriter::Workbook;

fn nfaudit() -> Command {
    Command::new(env!("CARGO_BIN_EXE_nfaudit"))
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn code(output: &Output) -> i32 {
    output.status.code().unwrap_or(-1)
}

fn nfe(note: &str, gross: &str, icms: &str, pis: &str, cofins: &str, m3: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<nfeProc xmlns="http://www.portalfiscal.inf.br/nfe"><NFe><infNFe>
  <ide><nNF>{note}</nNF></ide>
  <det nItem="1"><prod><uCom>M3</uCom><qCom>{m3}</qCom></prod></det>
  <total><ICMSTot><vNF>{gross}</vNF><vICMS>{icms}</vICMS><vPIS>{pis}</vPIS><vCOFINS>{cofins}</vCOFINS></ICMSTot></total>
</infNFe></NFe></nfeProc>"#
    )
}

/// Scratch layout: `docs/EMPRESA_A/*.xml` plus a `ledger.xlsx` with one
/// `25_OUT` sheet.
struct Scenario {
    dir: tempfile::TempDir,
}

impl Scenario {
    /// `ledger_rows`: (note, volume, net).
    fn new(docs: &[(&str, String)], ledger_rows: &[(&str, f64, f64)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let entity = dir.path().join("docs").join("EMPRESA_A");
        fs::create_dir_all(&entity).unwrap();
        for (name, xml) in docs {
            fs::write(entity.join(name), xml).unwrap();
        }

        let mut wb = Workbook::new();
        let ws = wb.add_worksheet().set_name("25_OUT").unwrap();
        for (col, title) in ["NOTA", "VOLUME", "S/TRIBUTOS"].iter().enumerate() {
            ws.write_string(0, col as u16, *title).unwrap();
        }
        for (i, (note, vol, net)) in ledger_rows.iter().enumerate() {
            let r = (i + 1) as u32;
            ws.write_string(r, 0, *note).unwrap();
            ws.write_number(r, 1, *vol).unwrap();
            ws.write_number(r, 2, *net).unwrap();
        }
        wb.save(dir.path().join("ledger.xlsx")).unwrap();

        Self { dir }
    }

    fn clean() -> Self {
        Self::new(
            &[("nf_100.xml", nfe("100", "100.00", "10.00", "1.00", "2.00", "3"))],
            &[("100", 3.0, 87.0)],
        )
    }

    fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    fn run(&self, extra: &[&str]) -> Output {
        nfaudit()
            .arg("run")
            .arg("--ledger")
            .arg(self.path("ledger.xlsx"))
            .arg("--docs")
            .arg(self.path("docs"))
            .args(extra)
            .output()
            .expect("run nfaudit")
    }
}

fn json_stdout(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim())
        .unwrap_or_else(|e| panic!("stdout must be one JSON value: {e}\n{stdout}"))
}

// ===========================================================================
// nfaudit run
// ===========================================================================

#[test]
fn clean_run_exits_zero_and_writes_reports() {
    let s = Scenario::clean();
    let xlsx = s.path("report.xlsx");
    let json = s.path("report.json");
    let output = s.run(&[
        "--output",
        xlsx.to_str().unwrap(),
        "--json-output",
        json.to_str().unwrap(),
    ]);

    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));
    assert!(xlsx.is_file());
    let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(report["summary"]["matched"], 1);
    assert!(stderr(&output).contains("1 rows: 1 ok"));
}

#[test]
fn mismatches_exit_60_with_json_report() {
    let s = Scenario::new(
        &[
            ("nf_100.xml", nfe("100", "100.00", "10.00", "1.00", "2.00", "3")),
            ("nf_200.xml", nfe("200", "50.00", "0", "0", "0", "1")),
            ("broken.xml", "<nfeProc><NFe>".to_string()),
        ],
        &[("100", 3.0, 70.0), ("300", 0.0, 10.0)],
    );
    let output = s.run(&["--json"]);

    assert_eq!(code(&output), 60, "stderr: {}", stderr(&output));
    let report = json_stdout(&output);
    let statuses: Vec<&str> = report["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["ERROR_VALUE", "MISSING_DOCUMENT", "MISSING_LEDGER_ENTRY"]);
    assert_eq!(report["summary"]["parse_failures"], 1);
    assert_eq!(report["parse_failures"][0]["source_file"], "broken.xml");
    assert!(stderr(&output).contains("3 rows not matched"));
}

#[test]
fn tolerance_flag_turns_mismatch_into_match() {
    let s = Scenario::new(
        &[("nf_100.xml", nfe("100", "100.00", "10.00", "1.00", "2.00", "3"))],
        &[("100", 3.0, 80.0)],
    );
    assert_eq!(code(&s.run(&[])), 60);
    assert_eq!(code(&s.run(&["--goods-tolerance", "10"])), 0);
}

#[test]
fn surfaced_parse_errors_add_rows() {
    let s = Scenario::new(
        &[
            ("nf_100.xml", nfe("100", "100.00", "10.00", "1.00", "2.00", "3")),
            ("broken.xml", "not xml at all <".to_string()),
        ],
        &[("100", 3.0, 87.0)],
    );
    let output = s.run(&["--json", "--surface-parse-errors"]);
    assert_eq!(code(&output), 60);
    let report = json_stdout(&output);
    assert_eq!(report["rows"][1]["status"], "PARSE_ERROR");
}

#[test]
fn unmatched_year_exits_61() {
    let s = Scenario::clean();
    let output = s.run(&["--year", "24"]);
    assert_eq!(code(&output), 61, "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("hint:"));
}

#[test]
fn period_without_rows_exits_62() {
    let s = Scenario::clean();
    let output = s.run(&["--period", "NOV"]);
    assert_eq!(code(&output), 62, "stderr: {}", stderr(&output));
}

#[test]
fn invalid_config_exits_63() {
    let s = Scenario::clean();
    let cfg = s.path("audit.toml");
    fs::write(&cfg, "[tolerance]\ngoods = -1\n").unwrap();
    let output = s.run(&["--config", cfg.to_str().unwrap()]);
    assert_eq!(code(&output), 63, "stderr: {}", stderr(&output));
}

#[test]
fn missing_ledger_exits_3() {
    let s = Scenario::clean();
    let output = nfaudit()
        .args(["run", "--ledger"])
        .arg(s.path("nope.xlsx"))
        .arg("--docs")
        .arg(s.path("docs"))
        .output()
        .unwrap();
    assert_eq!(code(&output), 3);
}

#[test]
fn unknown_entity_is_usage_error() {
    let s = Scenario::clean();
    assert_eq!(code(&s.run(&["--entity", "EMPRESA_Z"])), 2);
    assert_eq!(code(&s.run(&["--entity", "empresa_a"])), 0);
}

#[test]
fn docs_or_zip_is_required() {
    let s = Scenario::clean();
    let output = nfaudit()
        .args(["run", "--ledger"])
        .arg(s.path("ledger.xlsx"))
        .output()
        .unwrap();
    assert_eq!(code(&output), 2);
}

#[test]
fn zip_input_matches_folder_input() {
    use std::io::Write;

    let s = Scenario::clean();
    let zip_path = s.path("OUT.zip");
    let mut zip = zip::ZipWriter::new(fs::File::create(&zip_path).unwrap());
    zip.start_file("EMPRESA_A/nf_100.xml", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(nfe("100", "100.00", "10.00", "1.00", "2.00", "3").as_bytes())
        .unwrap();
    zip.finish().unwrap();

    let output = nfaudit()
        .arg("run")
        .arg("--ledger")
        .arg(s.path("ledger.xlsx"))
        .arg("--zip")
        .arg(&zip_path)
        .arg("--json")
        .output()
        .unwrap();
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));
    assert_eq!(json_stdout(&output)["rows"][0]["entity"], "EMPRESA_A");
}

// ===========================================================================
// nfaudit parse / ledger / config
// ===========================================================================

#[test]
fn parse_prints_records() {
    let s = Scenario::clean();
    let output = nfaudit()
        .arg("parse")
        .arg(s.path("docs/EMPRESA_A/nf_100.xml"))
        .output()
        .unwrap();
    assert_eq!(code(&output), 0);
    let value = json_stdout(&output);
    let record = &value[0]["record"];
    assert_eq!(record["kind"], "NF-e");
    assert_eq!(record["note_number"], "100");
    assert_eq!(record["net_amount_calculated"], "87");
    assert_eq!(record["entity"], "EMPRESA_A");
}

#[test]
fn parse_failure_exits_nonzero_but_prints_all() {
    let s = Scenario::clean();
    let bad = s.path("bad.xml");
    fs::write(&bad, "<root/>").unwrap();
    let output = nfaudit()
        .arg("parse")
        .arg(s.path("docs/EMPRESA_A/nf_100.xml"))
        .arg(&bad)
        .output()
        .unwrap();
    assert_eq!(code(&output), 1);
    let value = json_stdout(&output);
    assert_eq!(value.as_array().unwrap().len(), 2);
    assert!(value[1]["error"].as_str().unwrap().contains("neither"));
}

#[test]
fn ledger_prints_rows_and_sheet_outcomes() {
    let s = Scenario::clean();
    let output = nfaudit().arg("ledger").arg(s.path("ledger.xlsx")).output().unwrap();
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));
    let value = json_stdout(&output);
    assert_eq!(value["records"][0]["note_number"], "100");
    assert_eq!(value["sheets"][0]["outcome"], "loaded");

    let output = nfaudit()
        .arg("ledger")
        .arg(s.path("ledger.xlsx"))
        .args(["--periods", "JAN"])
        .output()
        .unwrap();
    assert_eq!(code(&output), 61);
}

#[test]
fn config_defaults_validate() {
    let dir = tempfile::tempdir().unwrap();
    let output = nfaudit().args(["config", "defaults"]).output().unwrap();
    assert_eq!(code(&output), 0);
    let path: &Path = &dir.path().join("defaults.toml");
    fs::write(path, &output.stdout).unwrap();

    let output = nfaudit().args(["config", "validate"]).arg(path).output().unwrap();
    assert_eq!(code(&output), 0, "stderr: {}", stderr(&output));
    assert!(stderr(&output).starts_with("ok:"));

    fs::write(path, "name = [").unwrap();
    let output = nfaudit().args(["config", "validate"]).arg(path).output().unwrap();
    assert_eq!(code(&output), 63);
}

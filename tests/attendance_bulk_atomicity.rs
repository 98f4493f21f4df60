use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendanced");
    let mut child = Command::new(exe)
        .env("ATTENDANCED_CONFIG", "/nonexistent/attendanced.toml")
        .env_remove("ATTENDANCED_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendanced");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn seed_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    class_name: &str,
    names: &[&str],
) -> (String, Vec<String>) {
    let class = request_ok(stdin, reader, "seed-class", "classes.create", json!({ "name": class_name, "grade": 4 }));
    let class_id = class["class"]["id"].as_str().expect("class id").to_string();
    let mut ids = Vec::new();
    for name in names {
        let s = request_ok(
            stdin,
            reader,
            "seed-student",
            "students.create",
            json!({ "name": name, "classId": class_id, "gender": "Female", "dateOfBirth": "2015-01-01" }),
        );
        ids.push(s["student"]["id"].as_str().expect("student id").to_string());
    }
    (class_id, ids)
}

#[test]
fn bulk_with_unknown_student_writes_nothing() {
    let workspace = temp_dir("attendanced-bulk");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let (_, ids) = seed_student(&mut stdin, &mut reader, "3C", &["Eli", "Fay"]);

    let rejected = request(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.bulkRecord",
        json!({
            "date": "2024-04-01",
            "records": [
                { "studentId": ids[0], "status": "Present" },
                { "studentId": "ghost", "status": "Absent" },
                { "studentId": ids[1], "status": "Late" }
            ]
        }),
    );
    assert_eq!(error_code(&rejected), "not_found");
    assert!(rejected["error"]["message"]
        .as_str()
        .unwrap_or("")
        .contains("ghost"));

    let listed = request_ok(&mut stdin, &mut reader, "3", "attendance.list", json!({}));
    assert_eq!(listed["pagination"]["total"], json!(0));

    let _ = child.kill();
}

#[test]
fn bulk_applies_one_date_to_every_row() {
    let workspace = temp_dir("attendanced-bulk-ok");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let (_, ids) = seed_student(&mut stdin, &mut reader, "3D", &["Gus", "Hal"]);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.record",
        json!({ "studentId": ids[0], "date": "2024-04-02", "status": "Absent" }),
    );
    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.bulkRecord",
        json!({
            "date": "2024-04-02",
            "records": [
                { "studentId": ids[0], "status": "Present" },
                { "studentId": ids[1], "status": "Excused" }
            ]
        }),
    );
    assert_eq!(saved["count"], json!(2));
    for row in saved["attendance"].as_array().expect("rows") {
        assert_eq!(row["date"], json!("2024-04-02"));
    }

    let listed = request_ok(&mut stdin, &mut reader, "4", "attendance.list", json!({ "date": "2024-04-02" }));
    assert_eq!(listed["pagination"]["total"], json!(2));
    let gus = request_ok(&mut stdin, &mut reader, "5", "attendance.list", json!({ "studentId": ids[0] }));
    assert_eq!(gus["attendance"][0]["status"], json!("Present"));

    let dup = request(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.bulkRecord",
        json!({
            "date": "2024-04-03",
            "records": [
                { "studentId": ids[0], "status": "Present" },
                { "studentId": ids[0], "status": "Absent" }
            ]
        }),
    );
    assert_eq!(error_code(&dup), "bad_params");
    assert_eq!(dup["error"]["details"]["field"], json!("records[1].studentId"));

    let empty = request(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.bulkRecord",
        json!({ "date": "2024-04-03", "records": [] }),
    );
    assert_eq!(empty["error"]["details"]["field"], json!("records"));

    let _ = child.kill();
}

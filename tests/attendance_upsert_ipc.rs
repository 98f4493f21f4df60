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
fn recording_twice_keeps_one_row_with_latest_status() {
    let workspace = temp_dir("attendanced-upsert");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let (_, ids) = seed_student(&mut stdin, &mut reader, "4A", &["Mae"]);
    let sid = &ids[0];

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.record",
        json!({ "studentId": sid, "date": "2024-02-01", "status": "Absent" }),
    );
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.record",
        json!({ "studentId": sid, "date": "2024-02-01", "status": "Late" }),
    );
    assert_eq!(first["attendance"]["id"], second["attendance"]["id"]);
    assert_eq!(second["attendance"]["status"], json!("Late"));
    assert_eq!(second["attendance"]["student"]["className"], json!("4A"));

    let listed = request_ok(&mut stdin, &mut reader, "4", "attendance.list", json!({ "studentId": sid }));
    assert_eq!(listed["pagination"]["total"], json!(1));
    assert_eq!(listed["attendance"][0]["status"], json!("Late"));

    let bad = request(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.record",
        json!({ "studentId": sid, "date": "2024-02-01", "status": "Sick" }),
    );
    assert_eq!(bad["error"]["details"]["field"], json!("status"));

    let bad_date = request(
        &mut stdin,
        &mut reader,
        "6",
        "attendance.record",
        json!({ "studentId": sid, "date": "01/02/2024", "status": "Present" }),
    );
    assert_eq!(bad_date["error"]["details"]["field"], json!("date"));

    let ghost = request(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.record",
        json!({ "studentId": "ghost", "date": "2024-02-01", "status": "Present" }),
    );
    assert_eq!(error_code(&ghost), "not_found");

    let _ = child.kill();
}

#[test]
fn list_orders_newest_first_and_filters() {
    let workspace = temp_dir("attendanced-list");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let (_, ids) = seed_student(&mut stdin, &mut reader, "4B", &["Ada", "Bea"]);
    for (i, (sid, date, status)) in [
        (&ids[0], "2024-02-01", "Present"),
        (&ids[0], "2024-02-03", "Absent"),
        (&ids[1], "2024-02-02", "Present"),
    ]
    .into_iter()
    .enumerate()
    {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("r{}", i),
            "attendance.record",
            json!({ "studentId": sid, "date": date, "status": status }),
        );
    }

    let all = request_ok(&mut stdin, &mut reader, "2", "attendance.list", json!({}));
    let dates: Vec<&str> = all["attendance"]
        .as_array()
        .expect("rows")
        .iter()
        .filter_map(|r| r["date"].as_str())
        .collect();
    assert_eq!(dates, vec!["2024-02-03", "2024-02-02", "2024-02-01"]);

    let present = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.list",
        json!({ "status": "Present", "startDate": "2024-02-02" }),
    );
    assert_eq!(present["pagination"]["total"], json!(1));
    assert_eq!(present["attendance"][0]["student"]["name"], json!("Bea"));

    let paged = request_ok(&mut stdin, &mut reader, "4", "attendance.list", json!({ "limit": 1, "offset": 2 }));
    assert_eq!(paged["attendance"][0]["date"], json!("2024-02-01"));
    assert_eq!(paged["pagination"]["total"], json!(3));

    let _ = child.kill();
}

#[test]
fn list_defaults_to_one_hundred_rows_per_page() {
    let workspace = temp_dir("attendanced-page-size");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let (_, ids) = seed_student(&mut stdin, &mut reader, "4C", &["Ola"]);
    let first = chrono::NaiveDate::from_ymd_opt(2023, 1, 1).expect("date");
    for n in 0..105u64 {
        let date = first + chrono::Days::new(n);
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("r{}", n),
            "attendance.record",
            json!({ "studentId": ids[0], "date": date.to_string(), "status": "Present" }),
        );
    }

    let page = request_ok(&mut stdin, &mut reader, "2", "attendance.list", json!({}));
    assert_eq!(page["pagination"]["limit"], json!(100));
    assert_eq!(page["pagination"]["total"], json!(105));
    assert_eq!(page["attendance"].as_array().map(|a| a.len()), Some(100));

    let rest = request_ok(&mut stdin, &mut reader, "3", "attendance.list", json!({ "offset": 100 }));
    assert_eq!(rest["attendance"].as_array().map(|a| a.len()), Some(5));
    assert_eq!(rest["attendance"][4]["date"], json!("2023-01-01"));

    let _ = child.kill();
}

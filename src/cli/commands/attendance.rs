use clap::Subcommand;
use serde_json::{json, Value};
use std::time::Duration;

use crate::cli::client::ApiClient;
use crate::cli::config::SessionStore;
use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum AttendanceCommands {
    #[command(about = "Ask to be marked present for a session")]
    Request {
        lec_serial: String,
        session: u32,
        #[arg(long)]
        reason: Option<String>,
    },

    #[command(about = "Record one session, e.g. `approve CS101 3 31=출 32=late`")]
    Approve {
        lec_serial: String,
        session: u32,
        #[arg(required = true, help = "studentIdx=status pairs (출/지/결 or present/late/absent)")]
        marks: Vec<String>,
    },

    #[command(about = "Approve every pending request of a lecture, one request at a time")]
    ApproveAll {
        lec_serial: String,
        #[arg(long, default_value = "출", help = "Status to record")]
        status: String,
        #[arg(long, default_value_t = 300, help = "Pause between requests in milliseconds")]
        delay_ms: u64,
    },

    #[command(about = "Your own attendance in a lecture")]
    Student { lec_serial: String },

    #[command(about = "Attendance of every student in a lecture")]
    Professor { lec_serial: String },
}

fn parse_mark(raw: &str) -> anyhow::Result<Value> {
    let (student, status) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("expected studentIdx=status, got '{}'", raw))?;
    let student_idx: i64 = student
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("'{}' is not a student index", student))?;
    Ok(json!({ "studentIdx": student_idx, "status": status.trim() }))
}

pub async fn handle(cmd: AttendanceCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut client = ApiClient::new(SessionStore::open_default()?)?;

    match cmd {
        AttendanceCommands::Request {
            lec_serial,
            session,
            reason,
        } => {
            let body = json!({ "lecSerial": lec_serial, "sessionNumber": session, "requestReason": reason });
            let data = client.post("/api/attendance/request", &body).await?;
            output_success(
                &output_format,
                &format!("Requested attendance for session {}", session),
                Some(data),
            )
        }
        AttendanceCommands::Approve {
            lec_serial,
            session,
            marks,
        } => {
            let records = marks.iter().map(|m| parse_mark(m)).collect::<anyhow::Result<Vec<_>>>()?;
            let body = json!({ "lecSerial": lec_serial, "sessionNumber": session, "attendanceRecords": records });
            let data = client.post("/api/attendance/approve", &body).await?;
            let succeeded = data.get("succeeded").and_then(Value::as_u64).unwrap_or(0);
            output_success(
                &output_format,
                &format!("{}/{} records applied", succeeded, records.len()),
                Some(data),
            )
        }
        AttendanceCommands::ApproveAll {
            lec_serial,
            status,
            delay_ms,
        } => {
            let view = client
                .post("/api/attendance/professor/view", &json!({ "lecSerial": lec_serial }))
                .await?;
            let pending: Vec<(u64, i64)> = view
                .get("pendingRequests")
                .and_then(Value::as_array)
                .map(|requests| {
                    requests
                        .iter()
                        .filter_map(|r| Some((r.get("sessionNumber")?.as_u64()?, r.get("studentIdx")?.as_i64()?)))
                        .collect()
                })
                .unwrap_or_default();

            if pending.is_empty() {
                return output_success(&output_format, "No pending requests", None);
            }

            let mut approved = 0;
            for (i, (session, student_idx)) in pending.iter().enumerate() {
                if i > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                let body = json!({
                    "lecSerial": lec_serial,
                    "sessionNumber": session,
                    "attendanceRecords": [{ "studentIdx": student_idx, "status": status }],
                });
                match client.post("/api/attendance/approve", &body).await {
                    Ok(report) if report.get("succeeded").and_then(Value::as_u64) == Some(1) => approved += 1,
                    Ok(report) => {
                        let reason = report["failed"][0]["reason"].as_str().unwrap_or("rejected").to_string();
                        output_error(
                            &output_format,
                            &format!("student {} session {}: {}", student_idx, session, reason),
                            None,
                        )?;
                    }
                    Err(e) => {
                        output_error(
                            &output_format,
                            &format!("student {} session {}: {}", student_idx, session, e),
                            None,
                        )?;
                    }
                }
            }

            output_success(
                &output_format,
                &format!("Approved {} of {} pending requests", approved, pending.len()),
                Some(json!({ "approved": approved, "pending": pending.len() })),
            )
        }
        AttendanceCommands::Student { lec_serial } => {
            let data = client
                .post("/api/attendance/student/view", &json!({ "lecSerial": lec_serial }))
                .await?;
            output_success(&output_format, &format!("Attendance in {}", lec_serial), Some(data))
        }
        AttendanceCommands::Professor { lec_serial } => {
            let data = client
                .post("/api/attendance/professor/view", &json!({ "lecSerial": lec_serial }))
                .await?;
            output_success(&output_format, &format!("Attendance in {}", lec_serial), Some(data))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_marks() {
        assert_eq!(parse_mark("31=출").unwrap(), json!({ "studentIdx": 31, "status": "출" }));
        assert!(parse_mark("31").is_err());
        assert!(parse_mark("kim=late").is_err());
    }
}

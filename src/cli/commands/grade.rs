use clap::{Subcommand, ValueEnum};
use serde_json::{json, Map, Value};

use crate::cli::client::ApiClient;
use crate::cli::config::SessionStore;
use crate::cli::utils::{output_success, parse_distribution};
use crate::cli::OutputFormat;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortByArg {
    Percentage,
    Name,
    StudentId,
}

impl SortByArg {
    fn as_api(&self) -> &'static str {
        match self {
            SortByArg::Percentage => "percentage",
            SortByArg::Name => "name",
            SortByArg::StudentId => "studentId",
        }
    }
}

#[derive(Subcommand)]
pub enum GradeCommands {
    #[command(about = "Set the grading policy of a lecture (omitted options keep their value)")]
    Config {
        #[arg(help = "Lecture serial")]
        lec_serial: String,
        #[arg(long, help = "Points for full attendance")]
        attendance_max: Option<f64>,
        #[arg(long, help = "Points deducted per late mark (0 to 1)")]
        late_penalty: Option<f64>,
        #[arg(long, help = "Number of sessions in the course")]
        sessions: Option<u32>,
        #[arg(long, help = "Letter distribution as A,B,C,D percentages, e.g. 30,40,20,10")]
        distribution: Option<String>,
        #[arg(long, help = "Show the stored policy without changing it")]
        show: bool,
    },

    #[command(about = "Show a grade (your own as a student, --student as professor)")]
    Show {
        lec_serial: String,
        #[arg(long)]
        student: Option<i64>,
    },

    #[command(about = "Show a student's grade with class rank and average")]
    View {
        lec_serial: String,
        #[arg(long)]
        student: i64,
    },

    #[command(about = "List every enrolled student's grade")]
    List {
        lec_serial: String,
        #[arg(long, value_enum, default_value = "percentage")]
        sort_by: SortByArg,
        #[arg(long, help = "asc or desc", default_value = "desc")]
        order: String,
        #[arg(long, default_value_t = 0)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        size: usize,
    },

    #[command(about = "Assign letter grades to the whole roster")]
    Finalize {
        lec_serial: String,
        #[arg(long, help = "Passing threshold percentage (server default 60)")]
        threshold: Option<f64>,
        #[arg(long, help = "Override distribution as A,B,C,D percentages")]
        distribution: Option<String>,
        #[arg(long, help = "Recompute grades that were already finalized")]
        refinalize: bool,
    },
}

pub async fn handle(cmd: GradeCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let mut client = ApiClient::new(SessionStore::open_default()?)?;

    match cmd {
        GradeCommands::Config {
            lec_serial,
            attendance_max,
            late_penalty,
            sessions,
            distribution,
            show,
        } => {
            let mut body = Map::new();
            body.insert("action".into(), json!(if show { "get-config" } else { "set-config" }));
            body.insert("lecSerial".into(), json!(lec_serial));
            if let Some(v) = attendance_max {
                body.insert("attendanceMaxScore".into(), json!(v));
            }
            if let Some(v) = late_penalty {
                body.insert("latePenaltyPerSession".into(), json!(v));
            }
            if let Some(v) = sessions {
                body.insert("totalSessions".into(), json!(v));
            }
            if let Some(raw) = distribution {
                body.insert("gradeDistribution".into(), parse_distribution(&raw)?);
            }

            let data = client
                .post("/api/enrollments/grade-config", &Value::Object(body))
                .await?;
            if let Some(warnings) = data.get("warnings").and_then(Value::as_array) {
                for warning in warnings.iter().filter_map(Value::as_str) {
                    eprintln!("warning: {}", warning);
                }
            }
            let message = if show { "Grade configuration" } else { "Grade configuration saved" };
            output_success(&output_format, message, data.get("config").cloned())
        }
        GradeCommands::Show { lec_serial, student } => {
            let body = json!({ "action": "get-grade", "lecSerial": lec_serial, "studentIdx": student });
            let data = client.post("/api/enrollments/grade-info", &body).await?;
            output_success(&output_format, &format!("Grade in {}", lec_serial), Some(data))
        }
        GradeCommands::View { lec_serial, student } => {
            let body = json!({ "action": "professor-view", "lecSerial": lec_serial, "studentIdx": student });
            let data = client.post("/api/enrollments/grade-info", &body).await?;
            output_success(
                &output_format,
                &format!("Grade of student {} in {}", student, lec_serial),
                Some(data),
            )
        }
        GradeCommands::List {
            lec_serial,
            sort_by,
            order,
            page,
            size,
        } => {
            let order = order.to_ascii_lowercase();
            if order != "asc" && order != "desc" {
                anyhow::bail!("--order must be asc or desc");
            }
            let body = json!({
                "action": "list-all",
                "lecSerial": lec_serial,
                "sortBy": sort_by.as_api(),
                "sortOrder": order,
                "page": page,
                "size": size,
            });
            let data = client.post("/api/enrollments/grade-list", &body).await?;
            let total = data.get("totalElements").and_then(Value::as_u64).unwrap_or(0);
            output_success(
                &output_format,
                &format!("{} students in {}", total, lec_serial),
                Some(data),
            )
        }
        GradeCommands::Finalize {
            lec_serial,
            threshold,
            distribution,
            refinalize,
        } => {
            let mut body = json!({
                "action": "finalize",
                "lecSerial": lec_serial,
                "refinalize": refinalize,
            });
            if let Some(t) = threshold {
                body["passingThreshold"] = json!(t);
            }
            if let Some(raw) = distribution {
                body["gradeDistribution"] = parse_distribution(&raw)?;
            }

            let data = client.post("/api/enrollments/grade-finalize", &body).await?;
            output_success(
                &output_format,
                &format!("Finalized grades for {}", lec_serial),
                data.get("stats").cloned(),
            )
        }
    }
}

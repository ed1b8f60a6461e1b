use std::path::Path;

use groupware_core::config::{AppConfig, LoadOptions};
use groupware_db::{connect_with_settings, migrations};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_database(&config));
            checks.push(check_upload_dir(&config.storage.upload_dir));
            checks.push(check_pdf_converter());
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["database_connectivity", "upload_dir"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
            checks.push(check_pdf_converter());
        }
    }

    // A skipped check is informational; only failures fail the report.
    let any_failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let (overall_status, summary) = if any_failed {
        (CheckStatus::Fail, "doctor: one or more readiness checks failed")
    } else {
        (CheckStatus::Pass, "doctor: all readiness checks passed")
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

fn check_database(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;

        let pending = migrations::pending_count(&pool)
            .await
            .map_err(|error| format!("failed to inspect migrations: {error}"));
        pool.close().await;
        pending
    });

    match result {
        Ok(0) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Pass,
            details: format!("connected using `{}`; schema is current", config.database.url),
        },
        Ok(pending) => DoctorCheck {
            name: "database_connectivity",
            status: CheckStatus::Fail,
            details: format!("{pending} pending migration(s); run `groupware migrate`"),
        },
        Err(error) => {
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error }
        }
    }
}

fn check_upload_dir(upload_dir: &Path) -> DoctorCheck {
    match std::fs::metadata(upload_dir) {
        Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => DoctorCheck {
            name: "upload_dir",
            status: CheckStatus::Pass,
            details: format!("`{}` is writable", upload_dir.display()),
        },
        Ok(meta) if meta.is_dir() => DoctorCheck {
            name: "upload_dir",
            status: CheckStatus::Fail,
            details: format!("`{}` is read-only", upload_dir.display()),
        },
        Ok(_) => DoctorCheck {
            name: "upload_dir",
            status: CheckStatus::Fail,
            details: format!("`{}` exists but is not a directory", upload_dir.display()),
        },
        // The server creates the directory on startup.
        Err(_) => DoctorCheck {
            name: "upload_dir",
            status: CheckStatus::Skipped,
            details: format!("`{}` does not exist yet", upload_dir.display()),
        },
    }
}

fn check_pdf_converter() -> DoctorCheck {
    match which::which("wkhtmltopdf") {
        Ok(path) => DoctorCheck {
            name: "pdf_converter",
            status: CheckStatus::Pass,
            details: format!("wkhtmltopdf found at `{}`", path.display()),
        },
        Err(_) => DoctorCheck {
            name: "pdf_converter",
            status: CheckStatus::Skipped,
            details: "wkhtmltopdf not found; documents are served as HTML".to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::{check_upload_dir, CheckStatus};

    #[test]
    fn upload_dir_check_distinguishes_missing_and_present() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert_eq!(check_upload_dir(dir.path()).status, CheckStatus::Pass);
        assert_eq!(check_upload_dir(&dir.path().join("missing")).status, CheckStatus::Skipped);

        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").expect("write");
        assert_eq!(check_upload_dir(&file).status, CheckStatus::Fail);
    }
}

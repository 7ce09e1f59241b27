// ==========================================
// 手术排程表导入系统 - 数据库结构
// ==========================================
// 职责: 建表（幂等）与 schema_version 记录
// 说明: 列的可空/默认值与 domain::columns 保持一致，
//       CHECK 约束对应列的声明类型
// 红线: 不做迁移，只在版本不符时报错
// ==========================================

use crate::db::read_schema_version;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use tracing::debug;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS patient (
    idmrn               TEXT PRIMARY KEY NOT NULL
                        CHECK (typeof(idmrn) = 'text' AND length(idmrn) <= 32),
    patient_given_name  TEXT NOT NULL CHECK (typeof(patient_given_name) = 'text'),
    patient_family_name TEXT NOT NULL CHECK (typeof(patient_family_name) = 'text'),
    date_of_birth       TEXT CHECK (date_of_birth IS NULL OR date(date_of_birth) IS NOT NULL),
    nhs_number          TEXT CHECK (nhs_number IS NULL OR length(nhs_number) <= 10),
    sex                 INTEGER CHECK (sex IS NULL OR typeof(sex) = 'integer')
);

CREATE INDEX IF NOT EXISTS idx_patient_given_name ON patient(patient_given_name);
CREATE INDEX IF NOT EXISTS idx_patient_family_name ON patient(patient_family_name);
CREATE INDEX IF NOT EXISTS idx_patient_nhs_number ON patient(nhs_number);

CREATE TABLE IF NOT EXISTS procedure (
    procedure_id        INTEGER PRIMARY KEY AUTOINCREMENT,
    idmrn               TEXT REFERENCES patient(idmrn)
                        CHECK (idmrn IS NULL OR length(idmrn) <= 32),
    surgical_procedure  TEXT NOT NULL CHECK (typeof(surgical_procedure) = 'text'),
    surgical_date       TEXT NOT NULL CHECK (date(surgical_date) IS NOT NULL),
    surgical_priority   TEXT,
    surgical_consultant TEXT,
    surgical_pathway    TEXT NOT NULL CHECK (typeof(surgical_pathway) = 'text'),
    surgical_notes      TEXT,
    pacu_request        INTEGER CHECK (pacu_request IS NULL OR pacu_request IN (0, 1)),
    cancelled           INTEGER NOT NULL DEFAULT 0 CHECK (cancelled IN (0, 1))
);

CREATE INDEX IF NOT EXISTS idx_procedure_natural_key
    ON procedure(idmrn, surgical_procedure, surgical_date);

CREATE TABLE IF NOT EXISTS schema_version (
    version    INTEGER NOT NULL,
    applied_at TEXT NOT NULL
);
"#;

/// 建表并记录版本；已有库版本不符时报错
pub fn ensure_schema(conn: &Connection) -> RepositoryResult<()> {
    match read_schema_version(conn)? {
        Some(actual) if actual != CURRENT_SCHEMA_VERSION => {
            return Err(RepositoryError::SchemaVersionMismatch {
                expected: CURRENT_SCHEMA_VERSION,
                actual,
            });
        }
        Some(_) => {
            conn.execute_batch(SCHEMA_SQL)?;
        }
        None => {
            conn.execute_batch(SCHEMA_SQL)?;
            conn.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
                params![
                    CURRENT_SCHEMA_VERSION,
                    chrono::Local::now().naive_local().to_string()
                ],
            )?;
            debug!(version = CURRENT_SCHEMA_VERSION, "数据库结构已创建");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_version_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        conn.execute("UPDATE schema_version SET version = 99", [])
            .unwrap();

        assert!(matches!(
            ensure_schema(&conn),
            Err(RepositoryError::SchemaVersionMismatch { actual: 99, .. })
        ));
    }

    #[test]
    fn test_check_constraints() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();

        let too_long = conn.execute(
            "INSERT INTO patient (idmrn, patient_given_name, patient_family_name, nhs_number)
             VALUES ('1', 'A', 'B', '12345678901')",
            [],
        );
        assert!(too_long.is_err());

        let bad_date = conn.execute(
            "INSERT INTO procedure (surgical_procedure, surgical_date, surgical_pathway)
             VALUES ('Knee', 'not a date', 'ortho')",
            [],
        );
        assert!(bad_date.is_err());
    }
}

// ==========================================
// 手术排程表导入系统 - 手术/患者仓储
// ==========================================
// 职责: patient / procedure 表的查询与写入，以及导入时的对账（upsert）
// 对账规则:
// - 按业务键 (病历号, 手术名称, 手术日期) 查找已有手术，找到则原地更新
// - 找不到时按病历号合并患者，手术作为新记录插入
// - 更新时只有非空值覆盖已有值，空值永不清除已有数据
// 红线: 不含解析逻辑，只负责数据访问
// ==========================================

use crate::domain::{Patient, Procedure, ProcedureView};
use crate::repository::error::RepositoryResult;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

/// upsert 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// 新插入，携带新手术 ID
    Added(i64),
    /// 原地更新，携带已有手术 ID
    Updated(i64),
}

impl UpsertOutcome {
    pub fn procedure_id(&self) -> i64 {
        match self {
            UpsertOutcome::Added(id) | UpsertOutcome::Updated(id) => *id,
        }
    }
}

const PROCEDURE_SELECT: &str = r#"
    SELECT procedure_id, idmrn, surgical_procedure, surgical_date,
           surgical_priority, surgical_consultant, surgical_pathway,
           surgical_notes, pacu_request, cancelled
    FROM procedure
"#;

// ==========================================
// ProcedureRepository
// ==========================================
/// 手术/患者仓储
/// 借用一个连接（或事务 / 保存点），生命周期由调用方的作用域决定
pub struct ProcedureRepository<'c> {
    conn: &'c Connection,
}

impl<'c> ProcedureRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// 按业务键查找已有手术
    ///
    /// # 参数
    /// - `idmrn`: 病历号（可为空，空值之间视为相等）
    /// - `name`: 手术名称
    /// - `date`: 手术日期
    ///
    /// # 返回
    /// - Ok(Some(Procedure)): 找到（多条时取 ID 最小者）
    /// - Ok(None): 未找到
    pub fn find_existing(
        &self,
        idmrn: Option<&str>,
        name: &str,
        date: NaiveDate,
    ) -> RepositoryResult<Option<Procedure>> {
        let sql = format!(
            "{PROCEDURE_SELECT} WHERE idmrn IS ?1 AND surgical_procedure = ?2 AND surgical_date = ?3
             ORDER BY procedure_id LIMIT 1"
        );
        let found = self
            .conn
            .query_row(&sql, params![idmrn, name, date], map_procedure)
            .optional()?;
        Ok(found)
    }

    /// 按主键查询手术
    pub fn find_procedure(&self, procedure_id: i64) -> RepositoryResult<Option<Procedure>> {
        let sql = format!("{PROCEDURE_SELECT} WHERE procedure_id = ?1");
        let found = self
            .conn
            .query_row(&sql, params![procedure_id], map_procedure)
            .optional()?;
        Ok(found)
    }

    /// 按病历号查询患者
    pub fn find_patient(&self, idmrn: &str) -> RepositoryResult<Option<Patient>> {
        let found = self
            .conn
            .query_row(
                r#"
                SELECT idmrn, patient_given_name, patient_family_name,
                       date_of_birth, nhs_number, sex
                FROM patient
                WHERE idmrn = ?1
                "#,
                params![idmrn],
                map_patient,
            )
            .optional()?;
        Ok(found)
    }

    /// 合并或新建患者
    ///
    /// 已存在时只用非空字段覆盖；不存在时插入（姓名缺失会触发约束错误）。
    /// 不使用 INSERT OR REPLACE: 替换会删除旧行并破坏外键引用。
    pub fn upsert_patient(&self, patient: &Patient) -> RepositoryResult<()> {
        let Some(idmrn) = patient.idmrn.as_deref() else {
            return Ok(());
        };

        match self.find_patient(idmrn)? {
            Some(mut existing) => {
                existing.merge_from(patient);
                self.conn.execute(
                    r#"
                    UPDATE patient
                    SET patient_given_name = ?2, patient_family_name = ?3,
                        date_of_birth = ?4, nhs_number = ?5, sex = ?6
                    WHERE idmrn = ?1
                    "#,
                    params![
                        idmrn,
                        existing.patient_given_name,
                        existing.patient_family_name,
                        existing.date_of_birth,
                        existing.nhs_number,
                        existing.sex,
                    ],
                )?;
                debug!(idmrn, "患者已合并");
            }
            None => {
                self.conn.execute(
                    r#"
                    INSERT INTO patient (
                        idmrn, patient_given_name, patient_family_name,
                        date_of_birth, nhs_number, sex
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    "#,
                    params![
                        idmrn,
                        patient.patient_given_name,
                        patient.patient_family_name,
                        patient.date_of_birth,
                        patient.nhs_number,
                        patient.sex,
                    ],
                )?;
                debug!(idmrn, "患者已新建");
            }
        }
        Ok(())
    }

    /// 插入手术，返回自增 ID；取消标记缺省为 false
    pub fn insert_procedure(&self, procedure: &Procedure) -> RepositoryResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO procedure (
                idmrn, surgical_procedure, surgical_date, surgical_priority,
                surgical_consultant, surgical_pathway, surgical_notes,
                pacu_request, cancelled
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                procedure.idmrn,
                procedure.surgical_procedure,
                procedure.surgical_date,
                procedure.surgical_priority,
                procedure.surgical_consultant,
                procedure.surgical_pathway,
                procedure.surgical_notes,
                procedure.pacu_request,
                procedure.cancelled.unwrap_or(false),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// 整行更新已有手术（调用方负责先合并）
    pub fn update_procedure(&self, procedure_id: i64, procedure: &Procedure) -> RepositoryResult<()> {
        self.conn.execute(
            r#"
            UPDATE procedure
            SET idmrn = ?2, surgical_procedure = ?3, surgical_date = ?4,
                surgical_priority = ?5, surgical_consultant = ?6,
                surgical_pathway = ?7, surgical_notes = ?8,
                pacu_request = ?9, cancelled = ?10
            WHERE procedure_id = ?1
            "#,
            params![
                procedure_id,
                procedure.idmrn,
                procedure.surgical_procedure,
                procedure.surgical_date,
                procedure.surgical_priority,
                procedure.surgical_consultant,
                procedure.surgical_pathway,
                procedure.surgical_notes,
                procedure.pacu_request,
                procedure.cancelled.unwrap_or(false),
            ],
        )?;
        Ok(())
    }

    /// 对账并写入一对患者/手术
    ///
    /// - 已有同业务键手术: 非空字段覆盖后更新，患者不动
    /// - 否则: 按病历号合并患者，再插入新手术
    pub fn upsert(&self, patient: &Patient, procedure: &Procedure) -> RepositoryResult<UpsertOutcome> {
        let existing = match (&procedure.surgical_procedure, procedure.surgical_date) {
            (Some(name), Some(date)) => self.find_existing(procedure.idmrn.as_deref(), name, date)?,
            _ => None,
        };

        if let Some(mut existing) = existing {
            // 业务键命中时 procedure_id 必然存在
            let procedure_id = existing.procedure_id.unwrap_or_default();
            existing.merge_from(procedure);
            self.update_procedure(procedure_id, &existing)?;
            info!(procedure_id, "手术已更新");
            return Ok(UpsertOutcome::Updated(procedure_id));
        }

        self.upsert_patient(patient)?;
        let procedure_id = self.insert_procedure(procedure)?;
        info!(procedure_id, "手术已新增");
        Ok(UpsertOutcome::Added(procedure_id))
    }

    /// 列出全部手术（联合患者信息），按 ID 排序
    pub fn all_procedures(&self) -> RepositoryResult<Vec<ProcedureView>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.procedure_id, p.idmrn, p.surgical_procedure, p.surgical_date,
                   p.surgical_priority, p.surgical_consultant, p.surgical_pathway,
                   p.surgical_notes, p.pacu_request, p.cancelled,
                   pt.patient_given_name, pt.patient_family_name, pt.date_of_birth,
                   pt.nhs_number, pt.sex
            FROM procedure p
            LEFT JOIN patient pt ON pt.idmrn = p.idmrn
            ORDER BY p.procedure_id
            "#,
        )?;

        let views = stmt
            .query_map([], |row| {
                Ok(ProcedureView {
                    procedure_id: row.get(0)?,
                    idmrn: row.get(1)?,
                    surgical_procedure: row.get(2)?,
                    surgical_date: row.get(3)?,
                    surgical_priority: row.get(4)?,
                    surgical_consultant: row.get(5)?,
                    surgical_pathway: row.get(6)?,
                    surgical_notes: row.get(7)?,
                    pacu_request: row.get(8)?,
                    cancelled: row.get(9)?,
                    patient_given_name: row.get(10)?,
                    patient_family_name: row.get(11)?,
                    date_of_birth: row.get(12)?,
                    nhs_number: row.get(13)?,
                    sex: row.get(14)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(views)
    }

    /// 列出全部患者，按病历号排序
    pub fn all_patients(&self) -> RepositoryResult<Vec<Patient>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT idmrn, patient_given_name, patient_family_name,
                   date_of_birth, nhs_number, sex
            FROM patient
            ORDER BY idmrn
            "#,
        )?;
        let patients = stmt
            .query_map([], map_patient)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(patients)
    }
}

fn map_procedure(row: &Row<'_>) -> rusqlite::Result<Procedure> {
    Ok(Procedure {
        procedure_id: row.get(0)?,
        idmrn: row.get(1)?,
        surgical_procedure: row.get(2)?,
        surgical_date: row.get(3)?,
        surgical_priority: row.get(4)?,
        surgical_consultant: row.get(5)?,
        surgical_pathway: row.get(6)?,
        surgical_notes: row.get(7)?,
        pacu_request: row.get(8)?,
        cancelled: row.get(9)?,
    })
}

fn map_patient(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        idmrn: row.get(0)?,
        patient_given_name: row.get(1)?,
        patient_family_name: row.get(2)?,
        date_of_birth: row.get(3)?,
        nhs_number: row.get(4)?,
        sex: row.get(5)?,
    })
}

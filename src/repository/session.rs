// ==========================================
// 手术排程表导入系统 - 存储会话
// ==========================================
// 作用域:
// - Store::scope    每个工作表一个事务，Ok 提交，Err 回滚后原样返回错误
// - Session::row_scope 每行一个保存点，成功即释放，失败只回滚该行
// 说明: 行级失败不影响同表已写入的行；整表不是原子的
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::ProcedureView;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::procedure_repo::ProcedureRepository;
use crate::repository::schema::ensure_schema;
use rusqlite::{Connection, Transaction};
use tracing::warn;

// ==========================================
// Store - 持有连接
// ==========================================
pub struct Store {
    conn: Connection,
}

impl Store {
    /// 打开连接串指向的数据库并确保表结构存在
    pub fn open(conn_str: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(conn_str)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// 从已有连接创建（同样确保表结构存在）
    pub fn from_connection(conn: Connection) -> RepositoryResult<Self> {
        ensure_schema(&conn)?;
        Ok(Self { conn })
    }

    /// 事务作用域: 闭包返回 Ok 则提交，返回 Err 则回滚并原样返回错误
    pub fn scope<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        E: From<RepositoryError>,
        F: FnOnce(&mut Session<'_>) -> Result<T, E>,
    {
        let tx = self.conn.transaction().map_err(|e| {
            E::from(RepositoryError::DatabaseTransactionError(e.to_string()))
        })?;
        let mut session = Session { tx };

        match f(&mut session) {
            Ok(value) => {
                session
                    .tx
                    .commit()
                    .map_err(|e| E::from(RepositoryError::DatabaseTransactionError(e.to_string())))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = session.tx.rollback() {
                    warn!(error = %rollback_err, "事务回滚失败");
                }
                Err(err)
            }
        }
    }

    /// 列出全部手术（联合患者信息）
    pub fn all_procedures(&self) -> RepositoryResult<Vec<ProcedureView>> {
        ProcedureRepository::new(&self.conn).all_procedures()
    }

    /// 只读仓储（作用域之外查询用）
    pub fn repository(&self) -> ProcedureRepository<'_> {
        ProcedureRepository::new(&self.conn)
    }
}

// ==========================================
// Session - 一个打开的事务
// ==========================================
pub struct Session<'c> {
    tx: Transaction<'c>,
}

impl Session<'_> {
    /// 行作用域: 在保存点内执行，成功释放，失败回滚该行后返回错误
    pub fn row_scope<T, F>(&mut self, f: F) -> RepositoryResult<T>
    where
        F: FnOnce(&ProcedureRepository<'_>) -> RepositoryResult<T>,
    {
        let mut sp = self.tx.savepoint()?;
        let result = f(&ProcedureRepository::new(&sp));

        match result {
            Ok(value) => {
                sp.commit()?;
                Ok(value)
            }
            Err(err) => {
                sp.rollback()?;
                // 回滚到保存点后仍需释放
                sp.commit()?;
                Err(err)
            }
        }
    }

    /// 事务内的仓储（不建保存点）
    pub fn repository(&self) -> ProcedureRepository<'_> {
        ProcedureRepository::new(&self.tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Patient, Procedure};
    use chrono::NaiveDate;

    fn procedure(name: &str, nhs: &str) -> (Patient, Procedure) {
        let patient = Patient {
            idmrn: Some(format!("mrn-{name}")),
            patient_given_name: Some("Alice".to_string()),
            patient_family_name: Some("Smith".to_string()),
            nhs_number: Some(nhs.to_string()),
            ..Patient::default()
        };
        let procedure = Procedure {
            idmrn: patient.idmrn.clone(),
            surgical_procedure: Some(name.to_string()),
            surgical_date: NaiveDate::from_ymd_opt(2024, 1, 5),
            surgical_pathway: Some("ortho".to_string()),
            ..Procedure::default()
        };
        (patient, procedure)
    }

    #[test]
    fn test_row_failure_keeps_other_rows() {
        let mut store = Store::open(":memory:").unwrap();

        let rejected = store
            .scope(|session| {
                let mut rejected = 0;
                for (name, nhs) in [("Knee", "1"), ("Hip", "12345678901"), ("Ankle", "3")] {
                    let (patient, procedure) = procedure(name, nhs);
                    if session
                        .row_scope(|repo| repo.upsert(&patient, &procedure))
                        .is_err()
                    {
                        rejected += 1;
                    }
                }
                Ok::<_, RepositoryError>(rejected)
            })
            .unwrap();

        assert_eq!(rejected, 1);
        let names: Vec<String> = store
            .all_procedures()
            .unwrap()
            .into_iter()
            .map(|p| p.surgical_procedure)
            .collect();
        assert_eq!(names, vec!["Knee".to_string(), "Ankle".to_string()]);
        assert_eq!(store.repository().all_patients().unwrap().len(), 2);
    }

    #[test]
    fn test_scope_error_rolls_back_sheet() {
        let mut store = Store::open(":memory:").unwrap();

        let result: RepositoryResult<()> = store.scope(|session| {
            let (patient, procedure) = procedure("Knee", "1");
            session.row_scope(|repo| repo.upsert(&patient, &procedure))?;
            Err(RepositoryError::DatabaseQueryError("boom".to_string()))
        });

        assert!(result.is_err());
        assert!(store.all_procedures().unwrap().is_empty());
    }
}

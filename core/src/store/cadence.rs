use super::{opt_decimal_col, parsed_col, ChasingStore};
use crate::{
    error::ChasingResult,
    model::{AssignmentMode, ChasingCadence, ChasingCadenceStep},
    types::{CadenceId, StepId, TenantId},
};
use rusqlite::{params, OptionalExtension, Row};

const CADENCE_COLUMNS: &str =
    "id, tenant_id, name, min_balance, assignment_mode, assignment_conditions";

const STEP_COLUMNS: &str = "id, cadence_id, name, action, schedule, sort_order, assigned_user_id";

impl ChasingStore {
    // ── Cadences ──────────────────────────────────────────────────

    /// Insert a cadence. The `id` field is ignored; the new rowid is returned.
    pub fn insert_cadence(&self, cadence: &ChasingCadence) -> ChasingResult<CadenceId> {
        self.conn.execute(
            "INSERT INTO chasing_cadence
             (tenant_id, name, min_balance, assignment_mode, assignment_conditions)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                cadence.tenant_id,
                cadence.name,
                cadence.min_balance.map(|d| d.to_string()),
                cadence.assignment_mode.as_str(),
                cadence.assignment_conditions,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_cadence(&self, cadence_id: CadenceId) -> ChasingResult<Option<ChasingCadence>> {
        let sql = format!("SELECT {CADENCE_COLUMNS} FROM chasing_cadence WHERE id = ?1");
        let cadence = self
            .conn
            .query_row(&sql, params![cadence_id], Self::map_cadence_row)
            .optional()?;
        Ok(cadence)
    }

    pub fn cadences_for_tenant(&self, tenant_id: TenantId) -> ChasingResult<Vec<ChasingCadence>> {
        let sql = format!(
            "SELECT {CADENCE_COLUMNS} FROM chasing_cadence WHERE tenant_id = ?1 ORDER BY id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![tenant_id], Self::map_cadence_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Cadences of one assignment mode, in storage order.
    pub fn cadences_by_mode(
        &self,
        tenant_id: TenantId,
        mode: AssignmentMode,
    ) -> ChasingResult<Vec<ChasingCadence>> {
        let sql = format!(
            "SELECT {CADENCE_COLUMNS} FROM chasing_cadence
             WHERE tenant_id = ?1 AND assignment_mode = ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![tenant_id, mode.as_str()], Self::map_cadence_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Steps ─────────────────────────────────────────────────────

    /// Insert a step. The `id` field is ignored; the new rowid is returned.
    pub fn insert_step(&self, step: &ChasingCadenceStep) -> ChasingResult<StepId> {
        self.conn.execute(
            "INSERT INTO chasing_cadence_step
             (cadence_id, name, action, schedule, sort_order, assigned_user_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                step.cadence_id,
                step.name,
                step.action.as_str(),
                step.schedule,
                step.sort_order,
                step.assigned_user_id,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn delete_step(&self, step_id: StepId) -> ChasingResult<()> {
        self.conn.execute(
            "DELETE FROM chasing_cadence_step WHERE id = ?1",
            params![step_id],
        )?;
        Ok(())
    }

    /// Steps of a cadence in sequence order (earliest first).
    pub fn cadence_steps(&self, cadence_id: CadenceId) -> ChasingResult<Vec<ChasingCadenceStep>> {
        let sql = format!(
            "SELECT {STEP_COLUMNS} FROM chasing_cadence_step
             WHERE cadence_id = ?1
             ORDER BY sort_order ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![cadence_id], Self::map_step_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn first_step(&self, cadence_id: CadenceId) -> ChasingResult<Option<ChasingCadenceStep>> {
        let sql = format!(
            "SELECT {STEP_COLUMNS} FROM chasing_cadence_step
             WHERE cadence_id = ?1
             ORDER BY sort_order ASC, id ASC
             LIMIT 1"
        );
        let step = self
            .conn
            .query_row(&sql, params![cadence_id], Self::map_step_row)
            .optional()?;
        Ok(step)
    }

    fn map_cadence_row(row: &Row<'_>) -> rusqlite::Result<ChasingCadence> {
        Ok(ChasingCadence {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            name: row.get(2)?,
            min_balance: opt_decimal_col(row, 3)?,
            assignment_mode: AssignmentMode::parse(&row.get::<_, String>(4)?),
            assignment_conditions: row.get(5)?,
        })
    }

    fn map_step_row(row: &Row<'_>) -> rusqlite::Result<ChasingCadenceStep> {
        Ok(ChasingCadenceStep {
            id: row.get(0)?,
            cadence_id: row.get(1)?,
            name: row.get(2)?,
            action: parsed_col(row, 3)?,
            schedule: row.get(4)?,
            sort_order: row.get(5)?,
            assigned_user_id: row.get(6)?,
        })
    }
}

use super::ChasingStore;
use crate::{
    error::ChasingResult,
    model::{ChasingStatistic, CompletedChasingStep, Task},
    types::{CustomerId, InvoiceId, TaskId, Timestamp},
};
use rusqlite::{params, Row};

impl ChasingStore {
    // ── Completed steps ───────────────────────────────────────────

    pub fn insert_completed_step(&self, step: &CompletedChasingStep) -> ChasingResult<i64> {
        self.conn.execute(
            "INSERT INTO completed_chasing_step
             (tenant_id, customer_id, cadence_id, chase_step_id, successful, message, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                step.tenant_id,
                step.customer_id,
                step.cadence_id,
                step.chase_step_id,
                step.successful,
                step.message,
                step.timestamp,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Completed steps for a customer, oldest first.
    pub fn completed_steps_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> ChasingResult<Vec<CompletedChasingStep>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tenant_id, customer_id, cadence_id, chase_step_id, successful,
                    message, timestamp
             FROM completed_chasing_step
             WHERE customer_id = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![customer_id], |row| {
                Ok(CompletedChasingStep {
                    id: Some(row.get(0)?),
                    tenant_id: row.get(1)?,
                    customer_id: row.get(2)?,
                    cadence_id: row.get(3)?,
                    chase_step_id: row.get(4)?,
                    successful: row.get(5)?,
                    message: row.get(6)?,
                    timestamp: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn delete_completed_steps_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> ChasingResult<usize> {
        let n = self.conn.execute(
            "DELETE FROM completed_chasing_step WHERE customer_id = ?1",
            params![customer_id],
        )?;
        Ok(n)
    }

    // ── Statistics ────────────────────────────────────────────────

    /// Highest attempt count recorded for an invoice across all steps, 0 if none.
    pub fn max_statistic_attempts(&self, invoice_id: InvoiceId) -> ChasingResult<i64> {
        let n = self.conn.query_row(
            "SELECT COALESCE(MAX(attempts), 0) FROM chasing_statistic WHERE invoice_id = ?1",
            params![invoice_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    /// Bulk write of statistics in one transaction. A row for an existing
    /// (customer, cadence, step, invoice) key is overwritten and reopened.
    pub fn mass_upsert_statistics(&self, stats: &[ChasingStatistic]) -> ChasingResult<usize> {
        if stats.is_empty() {
            return Ok(0);
        }
        self.transaction(|store| {
            let mut stmt = store.conn.prepare(
                "INSERT INTO chasing_statistic
                 (tenant_id, customer_id, cadence_id, chase_step_id, invoice_id, attempts,
                  channel, date, paid, payment_responsible)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT (customer_id, cadence_id, chase_step_id, invoice_id) DO UPDATE SET
                    attempts = excluded.attempts,
                    channel = excluded.channel,
                    date = excluded.date,
                    paid = excluded.paid,
                    payment_responsible = excluded.payment_responsible",
            )?;
            for s in stats {
                stmt.execute(params![
                    s.tenant_id,
                    s.customer_id,
                    s.cadence_id,
                    s.chase_step_id,
                    s.invoice_id,
                    s.attempts,
                    s.channel,
                    s.date,
                    s.paid,
                    s.payment_responsible,
                ])?;
            }
            Ok(stats.len())
        })
    }

    pub fn statistics_for_invoice(
        &self,
        invoice_id: InvoiceId,
    ) -> ChasingResult<Vec<ChasingStatistic>> {
        let mut stmt = self.conn.prepare(
            "SELECT tenant_id, customer_id, cadence_id, chase_step_id, invoice_id, attempts,
                    channel, date, paid, payment_responsible
             FROM chasing_statistic
             WHERE invoice_id = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![invoice_id], Self::map_statistic_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Mark every open statistic row of an invoice as resolved.
    pub fn close_open_statistics(
        &self,
        invoice_id: InvoiceId,
        paid_at: Timestamp,
        payment_responsible: bool,
    ) -> ChasingResult<usize> {
        let n = self.conn.execute(
            "UPDATE chasing_statistic SET paid = ?1, payment_responsible = ?2
             WHERE invoice_id = ?3 AND paid IS NULL",
            params![paid_at, payment_responsible, invoice_id],
        )?;
        Ok(n)
    }

    fn map_statistic_row(row: &Row<'_>) -> rusqlite::Result<ChasingStatistic> {
        Ok(ChasingStatistic {
            tenant_id: row.get(0)?,
            customer_id: row.get(1)?,
            cadence_id: row.get(2)?,
            chase_step_id: row.get(3)?,
            invoice_id: row.get(4)?,
            attempts: row.get(5)?,
            channel: row.get(6)?,
            date: row.get(7)?,
            paid: row.get(8)?,
            payment_responsible: row.get(9)?,
        })
    }

    // ── Tasks ─────────────────────────────────────────────────────

    pub fn insert_task(&self, task: &Task) -> ChasingResult<TaskId> {
        self.conn.execute(
            "INSERT INTO task
             (tenant_id, customer_id, chase_step_id, name, action, user_id, due_date, complete)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                task.tenant_id,
                task.customer_id,
                task.chase_step_id,
                task.name,
                task.action,
                task.user_id,
                task.due_date,
                task.complete,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn tasks_for_customer(&self, customer_id: CustomerId) -> ChasingResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, tenant_id, customer_id, chase_step_id, name, action, user_id,
                    due_date, complete
             FROM task WHERE customer_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![customer_id], |row| {
                Ok(Task {
                    id: Some(row.get(0)?),
                    tenant_id: row.get(1)?,
                    customer_id: row.get(2)?,
                    chase_step_id: row.get(3)?,
                    name: row.get(4)?,
                    action: row.get(5)?,
                    user_id: row.get(6)?,
                    due_date: row.get(7)?,
                    complete: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn delete_incomplete_tasks_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> ChasingResult<usize> {
        let n = self.conn.execute(
            "DELETE FROM task WHERE customer_id = ?1 AND complete = 0",
            params![customer_id],
        )?;
        Ok(n)
    }
}

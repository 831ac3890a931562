use super::{json_col, ChasingStore};
use crate::{
    error::ChasingResult,
    model::Customer,
    money::Currency,
    types::{CadenceId, CustomerId, StepId, TenantId, Timestamp},
};
use rusqlite::{params, OptionalExtension, Row};

const CUSTOMER_COLUMNS: &str = "id, tenant_id, client_id, name, email, phone, address, country,
     currency, chase, chasing_cadence_id, next_chase_step_id, metadata, created_at";

impl ChasingStore {
    // ── Customer ──────────────────────────────────────────────────

    /// Insert a customer. The `id` field is ignored; the new rowid is returned.
    pub fn insert_customer(&self, c: &Customer) -> ChasingResult<CustomerId> {
        self.conn.execute(
            "INSERT INTO customer (
                tenant_id, client_id, name, email, phone, address, country, currency,
                chase, chasing_cadence_id, next_chase_step_id, metadata, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                c.tenant_id,
                c.client_id,
                c.name,
                c.email,
                c.phone,
                c.address,
                c.country,
                c.currency.as_ref().map(|cur| cur.code().to_string()),
                c.chase,
                c.chasing_cadence_id,
                c.next_chase_step_id,
                serde_json::to_string(&c.metadata)?,
                c.created_at,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_customer(&self, customer_id: CustomerId) -> ChasingResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customer WHERE id = ?1");
        let customer = self
            .conn
            .query_row(&sql, params![customer_id], Self::map_customer_row)
            .optional()?;
        Ok(customer)
    }

    /// Full customer write from the billing core. Queues the customer for
    /// the outbound accounting sync.
    pub fn save_customer(&self, c: &Customer, now: Timestamp) -> ChasingResult<()> {
        self.conn.execute(
            "UPDATE customer SET
                client_id = ?1, name = ?2, email = ?3, phone = ?4, address = ?5,
                country = ?6, currency = ?7, chase = ?8, chasing_cadence_id = ?9,
                next_chase_step_id = ?10, metadata = ?11
             WHERE id = ?12",
            params![
                c.client_id,
                c.name,
                c.email,
                c.phone,
                c.address,
                c.country,
                c.currency.as_ref().map(|cur| cur.code().to_string()),
                c.chase,
                c.chasing_cadence_id,
                c.next_chase_step_id,
                serde_json::to_string(&c.metadata)?,
                c.id,
            ],
        )?;
        self.conn.execute(
            "INSERT INTO accounting_sync_queue (tenant_id, customer_id, queued_at)
             VALUES (?1, ?2, ?3)",
            params![c.tenant_id, c.id, now],
        )?;
        Ok(())
    }

    /// Move the chasing cursor. Writes nothing else and never queues an
    /// accounting sync.
    pub fn update_chase_cursor(
        &self,
        customer_id: CustomerId,
        next_step_id: Option<StepId>,
    ) -> ChasingResult<()> {
        self.conn.execute(
            "UPDATE customer SET next_chase_step_id = ?1 WHERE id = ?2",
            params![next_step_id, customer_id],
        )?;
        Ok(())
    }

    /// Enrol a customer in a cadence, pointing the cursor at `first_step_id`.
    pub fn assign_cadence(
        &self,
        customer_id: CustomerId,
        cadence_id: Option<CadenceId>,
        first_step_id: Option<StepId>,
    ) -> ChasingResult<()> {
        self.conn.execute(
            "UPDATE customer SET chasing_cadence_id = ?1, next_chase_step_id = ?2
             WHERE id = ?3",
            params![cadence_id, first_step_id, customer_id],
        )?;
        Ok(())
    }

    /// One keyset page of customers eligible for a cadence run:
    /// enrolled, cursor set, not opted out. Ordered by id.
    pub fn chaseable_customers_page(
        &self,
        cadence_id: CadenceId,
        after_id: CustomerId,
        limit: usize,
    ) -> ChasingResult<Vec<Customer>> {
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer
             WHERE chasing_cadence_id = ?1
               AND next_chase_step_id IS NOT NULL
               AND chase = 1
               AND id > ?2
             ORDER BY id ASC
             LIMIT ?3"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![cadence_id, after_id, limit as i64], Self::map_customer_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// One keyset page of customers that want chasing but have no cadence.
    pub fn unassigned_customers_page(
        &self,
        tenant_id: TenantId,
        after_id: CustomerId,
        limit: usize,
    ) -> ChasingResult<Vec<Customer>> {
        let sql = format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customer
             WHERE tenant_id = ?1
               AND chasing_cadence_id IS NULL
               AND chase = 1
               AND id > ?2
             ORDER BY id ASC
             LIMIT ?3"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![tenant_id, after_id, limit as i64], Self::map_customer_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn accounting_sync_count(&self, customer_id: CustomerId) -> ChasingResult<i64> {
        let n = self.conn.query_row(
            "SELECT COUNT(*) FROM accounting_sync_queue WHERE customer_id = ?1",
            params![customer_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    fn map_customer_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
        Ok(Customer {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            client_id: row.get(2)?,
            name: row.get(3)?,
            email: row.get(4)?,
            phone: row.get(5)?,
            address: row.get(6)?,
            country: row.get(7)?,
            currency: row
                .get::<_, Option<String>>(8)?
                .map(|code| Currency::new(&code)),
            chase: row.get(9)?,
            chasing_cadence_id: row.get(10)?,
            next_chase_step_id: row.get(11)?,
            metadata: json_col(row, 12)?,
            created_at: row.get(13)?,
        })
    }
}

use super::{decimal_col, parsed_col, ChasingStore};
use crate::{
    error::ChasingResult,
    model::{CreditNote, Invoice, PendingTransaction},
    money::Currency,
    payment_plan::{Installment, PaymentPlan},
    types::{CreditNoteId, CustomerId, InvoiceId, PaymentPlanId, Timestamp},
};
use rusqlite::{params, OptionalExtension, Row};

const INVOICE_COLUMNS: &str = "id, tenant_id, customer_id, number, currency, total, balance,
     date, due_date, status, paid, closed, draft, voided, autopay, payment_plan_id";

const CREDIT_NOTE_COLUMNS: &str =
    "id, tenant_id, customer_id, currency, balance, date, paid, closed, draft, voided";

impl ChasingStore {
    // ── Invoices ──────────────────────────────────────────────────

    /// Insert an invoice. The `id` field is ignored; the new rowid is returned.
    pub fn insert_invoice(&self, inv: &Invoice) -> ChasingResult<InvoiceId> {
        self.conn.execute(
            "INSERT INTO invoice (
                tenant_id, customer_id, number, currency, total, balance, date, due_date,
                status, paid, closed, draft, voided, autopay, payment_plan_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                inv.tenant_id,
                inv.customer_id,
                inv.number,
                inv.currency.code(),
                inv.total.to_string(),
                inv.balance.to_string(),
                inv.date,
                inv.due_date,
                inv.status.as_str(),
                inv.paid,
                inv.closed,
                inv.draft,
                inv.voided,
                inv.autopay,
                inv.payment_plan_id,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_invoice(&self, invoice_id: InvoiceId) -> ChasingResult<Option<Invoice>> {
        let sql = format!("SELECT {INVOICE_COLUMNS} FROM invoice WHERE id = ?1");
        let inv = self
            .conn
            .query_row(&sql, params![invoice_id], Self::map_invoice_row)
            .optional()?;
        Ok(inv)
    }

    pub fn update_invoice(&self, inv: &Invoice) -> ChasingResult<()> {
        self.conn.execute(
            "UPDATE invoice SET
                number = ?1, currency = ?2, total = ?3, balance = ?4, date = ?5,
                due_date = ?6, status = ?7, paid = ?8, closed = ?9, draft = ?10,
                voided = ?11, autopay = ?12, payment_plan_id = ?13
             WHERE id = ?14",
            params![
                inv.number,
                inv.currency.code(),
                inv.total.to_string(),
                inv.balance.to_string(),
                inv.date,
                inv.due_date,
                inv.status.as_str(),
                inv.paid,
                inv.closed,
                inv.draft,
                inv.voided,
                inv.autopay,
                inv.payment_plan_id,
                inv.id,
            ],
        )?;
        Ok(())
    }

    pub fn delete_invoice(&self, invoice_id: InvoiceId) -> ChasingResult<()> {
        self.conn
            .execute("DELETE FROM invoice WHERE id = ?1", params![invoice_id])?;
        Ok(())
    }

    /// Invoices that make up a customer's chaseable balance in one currency:
    /// unpaid, open, finalized, not voided, issued on or before `now`, not on
    /// autopay. Oldest first.
    pub fn chaseable_invoices(
        &self,
        customer_id: CustomerId,
        currency: &Currency,
        now: Timestamp,
    ) -> ChasingResult<Vec<Invoice>> {
        let sql = format!(
            "SELECT {INVOICE_COLUMNS} FROM invoice
             WHERE customer_id = ?1
               AND paid = 0 AND closed = 0 AND draft = 0 AND voided = 0
               AND date <= ?2
               AND autopay = 0
               AND currency = ?3
             ORDER BY date ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![customer_id, now, currency.code()],
                Self::map_invoice_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_invoice_row(row: &Row<'_>) -> rusqlite::Result<Invoice> {
        Ok(Invoice {
            id: row.get(0)?,
            tenant_id: row.get(1)?,
            customer_id: row.get(2)?,
            number: row.get(3)?,
            currency: Currency::new(&row.get::<_, String>(4)?),
            total: decimal_col(row, 5)?,
            balance: decimal_col(row, 6)?,
            date: row.get(7)?,
            due_date: row.get(8)?,
            status: parsed_col(row, 9)?,
            paid: row.get(10)?,
            closed: row.get(11)?,
            draft: row.get(12)?,
            voided: row.get(13)?,
            autopay: row.get(14)?,
            payment_plan_id: row.get(15)?,
        })
    }

    // ── Credit notes ──────────────────────────────────────────────

    pub fn insert_credit_note(&self, cn: &CreditNote) -> ChasingResult<CreditNoteId> {
        self.conn.execute(
            "INSERT INTO credit_note
             (tenant_id, customer_id, currency, balance, date, paid, closed, draft, voided)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                cn.tenant_id,
                cn.customer_id,
                cn.currency.code(),
                cn.balance.to_string(),
                cn.date,
                cn.paid,
                cn.closed,
                cn.draft,
                cn.voided,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Open credit notes, same filters as `chaseable_invoices`.
    pub fn open_credit_notes(
        &self,
        customer_id: CustomerId,
        currency: &Currency,
        now: Timestamp,
    ) -> ChasingResult<Vec<CreditNote>> {
        let sql = format!(
            "SELECT {CREDIT_NOTE_COLUMNS} FROM credit_note
             WHERE customer_id = ?1
               AND paid = 0 AND closed = 0 AND draft = 0 AND voided = 0
               AND date <= ?2
               AND currency = ?3
             ORDER BY date ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![customer_id, now, currency.code()], |row| {
                Ok(CreditNote {
                    id: row.get(0)?,
                    tenant_id: row.get(1)?,
                    customer_id: row.get(2)?,
                    currency: Currency::new(&row.get::<_, String>(3)?),
                    balance: decimal_col(row, 4)?,
                    date: row.get(5)?,
                    paid: row.get(6)?,
                    closed: row.get(7)?,
                    draft: row.get(8)?,
                    voided: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn close_credit_note(&self, credit_note_id: CreditNoteId) -> ChasingResult<()> {
        self.conn.execute(
            "UPDATE credit_note SET closed = 1, balance = '0' WHERE id = ?1",
            params![credit_note_id],
        )?;
        Ok(())
    }

    // ── Payment plans ─────────────────────────────────────────────

    pub fn insert_payment_plan(&self, plan: &PaymentPlan) -> ChasingResult<PaymentPlanId> {
        self.conn.execute(
            "INSERT INTO payment_plan (invoice_id) VALUES (?1)",
            params![plan.invoice_id],
        )?;
        let plan_id = self.conn.last_insert_rowid();
        for installment in &plan.installments {
            self.conn.execute(
                "INSERT INTO payment_plan_installment (payment_plan_id, date, amount, balance)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    plan_id,
                    installment.date,
                    installment.amount.to_string(),
                    installment.balance.to_string(),
                ],
            )?;
        }
        Ok(plan_id)
    }

    pub fn get_payment_plan(&self, plan_id: PaymentPlanId) -> ChasingResult<Option<PaymentPlan>> {
        let invoice_id: Option<InvoiceId> = self
            .conn
            .query_row(
                "SELECT invoice_id FROM payment_plan WHERE id = ?1",
                params![plan_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(invoice_id) = invoice_id else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT id, date, amount, balance FROM payment_plan_installment
             WHERE payment_plan_id = ?1
             ORDER BY date ASC, id ASC",
        )?;
        let installments = stmt
            .query_map(params![plan_id], |row| {
                Ok(Installment {
                    id: Some(row.get(0)?),
                    date: row.get(1)?,
                    amount: decimal_col(row, 2)?,
                    balance: decimal_col(row, 3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(PaymentPlan {
            id: Some(plan_id),
            invoice_id,
            installments,
        }))
    }

    // ── Pending transactions ──────────────────────────────────────

    pub fn insert_pending_transaction(&self, txn: &PendingTransaction) -> ChasingResult<i64> {
        self.conn.execute(
            "INSERT INTO pending_transaction (invoice_id, currency, amount)
             VALUES (?1, ?2, ?3)",
            params![txn.invoice_id, txn.currency.code(), txn.amount.to_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn pending_transactions_for_invoice(
        &self,
        invoice_id: InvoiceId,
    ) -> ChasingResult<Vec<PendingTransaction>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, invoice_id, currency, amount FROM pending_transaction
             WHERE invoice_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![invoice_id], |row| {
                Ok(PendingTransaction {
                    id: row.get(0)?,
                    invoice_id: row.get(1)?,
                    currency: Currency::new(&row.get::<_, String>(2)?),
                    amount: decimal_col(row, 3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

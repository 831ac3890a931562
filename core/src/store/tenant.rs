use super::{json_col, ChasingStore};
use crate::{error::ChasingResult, model::Tenant, money::Currency, types::TenantId};
use rusqlite::{params, OptionalExtension};

impl ChasingStore {
    // ── Tenant ────────────────────────────────────────────────────

    pub fn insert_tenant(&self, tenant: &Tenant) -> ChasingResult<TenantId> {
        self.conn.execute(
            "INSERT INTO tenant (id, name, currency, features) VALUES (?1, ?2, ?3, ?4)",
            params![
                tenant.id,
                tenant.name,
                tenant.currency.code(),
                serde_json::to_string(&tenant.features)?,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_tenant(&self, tenant_id: TenantId) -> ChasingResult<Option<Tenant>> {
        let tenant = self
            .conn
            .query_row(
                "SELECT id, name, currency, features FROM tenant WHERE id = ?1",
                params![tenant_id],
                |row| {
                    Ok(Tenant {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        currency: Currency::new(&row.get::<_, String>(2)?),
                        features: json_col(row, 3)?,
                    })
                },
            )
            .optional()?;
        Ok(tenant)
    }
}

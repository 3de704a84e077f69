//! Client database operations.

use rusqlite::{params, OptionalExtension};

use super::{parse_json, Database};
use crate::models::{Client, NewClient, Workflow};
use crate::store::{apply_patch, sort_closed_clients, ClientStore, Patch, StoreResult};

impl Database {
    fn insert_client(&self, client: &Client) -> StoreResult<()> {
        let record = serde_json::to_string(client)?;
        self.conn.execute(
            r#"
            INSERT INTO clients (
                id, status, email, phone, closed_date, closed_from_workflow,
                record, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                client.id,
                client.status.as_str(),
                client.email,
                client.phone,
                client.closed_date,
                client.closed_from_workflow.map(|w| w.as_str()),
                record,
                client.created_at,
                client.updated_at,
            ],
        )?;
        Ok(())
    }

    fn query_clients(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> StoreResult<Vec<Client>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(args, |row| row.get::<_, String>(0))?;

        let mut clients = Vec::new();
        for row in rows {
            clients.push(parse_json("clients.record", &row?)?);
        }
        Ok(clients)
    }
}

impl ClientStore for Database {
    fn list_clients(&self) -> StoreResult<Vec<Client>> {
        self.query_clients("SELECT record FROM clients ORDER BY rowid", &[])
    }

    fn get_client(&self, id: &str) -> StoreResult<Option<Client>> {
        self.conn
            .query_row("SELECT record FROM clients WHERE id = ?", [id], |row| {
                row.get::<_, String>(0)
            })
            .optional()?
            .map(|record| parse_json("clients.record", &record))
            .transpose()
    }

    fn create_client(&self, intake: NewClient) -> StoreResult<Client> {
        let client = Client::new(intake);
        self.insert_client(&client)?;
        Ok(client)
    }

    fn update_client(&self, id: &str, patch: &Patch) -> StoreResult<Option<Client>> {
        let Some(current) = self.get_client(id)? else {
            return Ok(None);
        };
        let updated = apply_patch(&current, patch)?;
        self.save_client(&updated)?;
        Ok(Some(updated))
    }

    fn save_client(&self, client: &Client) -> StoreResult<bool> {
        let record = serde_json::to_string(client)?;
        let rows_affected = self.conn.execute(
            r#"
            UPDATE clients SET
                status = ?2,
                email = ?3,
                phone = ?4,
                closed_date = ?5,
                closed_from_workflow = ?6,
                record = ?7,
                updated_at = ?8
            WHERE id = ?1
            "#,
            params![
                client.id,
                client.status.as_str(),
                client.email,
                client.phone,
                client.closed_date,
                client.closed_from_workflow.map(|w| w.as_str()),
                record,
                client.updated_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    fn list_closed_clients(&self, workflow: Option<Workflow>) -> StoreResult<Vec<Client>> {
        let mut clients = match workflow {
            Some(workflow) => self.query_clients(
                "SELECT record FROM clients WHERE closed_date IS NOT NULL AND closed_from_workflow = ?",
                &[&workflow.as_str()],
            )?,
            None => self.query_clients("SELECT record FROM clients WHERE closed_date IS NOT NULL", &[])?,
        };
        sort_closed_clients(&mut clients);
        Ok(clients)
    }
}

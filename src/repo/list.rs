use rusqlite::{Connection, OptionalExtension, Row};
use std::collections::HashMap;
use crate::error::CrmError;
use crate::models::{LeadList, LeadStatus, ListField, ListSettings, ListStatus};
use anyhow::{Context, Result};

/// List repository for database operations
///
/// Lists own a field schema and a settings bag, both stored as JSON.
/// Deleting a list removes its leads (and through them their call and SMS
/// logs) in the same transaction.
///
/// # Example
///
/// ```no_run
/// use callq::db::DbConnection;
/// use callq::models::{FieldKind, ListField};
/// use callq::repo::ListRepo;
///
/// let conn = DbConnection::connect().unwrap();
/// let fields = vec![ListField::new("Company", FieldKind::Text), ListField::new("Phone", FieldKind::Phone)];
/// let list = ListRepo::create(&conn, "Vilnius SMB", None, &fields).unwrap();
/// ```
pub struct ListRepo;

const LIST_COLUMNS: &str =
    "id, name, description, fields_json, settings_json, status, created_ts, modified_ts";

fn list_from_row(row: &Row) -> rusqlite::Result<LeadList> {
    let fields_json: String = row.get(3)?;
    let settings_json: String = row.get(4)?;
    let fields: Vec<ListField> = serde_json::from_str(&fields_json).unwrap_or_else(|e| {
        log::warn!("list {}: unreadable field schema: {}", row.get::<_, i64>(0).unwrap_or(0), e);
        Vec::new()
    });
    let settings: ListSettings = serde_json::from_str(&settings_json).unwrap_or_default();

    Ok(LeadList {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        description: row.get(2)?,
        fields,
        settings,
        status: ListStatus::from_str(&row.get::<_, String>(5)?).unwrap_or(ListStatus::Active),
        created_ts: row.get(6)?,
        modified_ts: row.get(7)?,
    })
}

impl ListRepo {
    /// Create a new list with a field schema
    pub fn create(conn: &Connection, name: &str, description: Option<&str>, fields: &[ListField]) -> Result<LeadList> {
        if Self::get_by_name(conn, name)?.is_some() {
            return Err(CrmError::DuplicateName { kind: "List", name: name.to_string() }.into());
        }

        let mut list = LeadList::new(name.to_string());
        list.description = description.map(str::to_string);
        list.fields = fields.to_vec();

        conn.execute(
            "INSERT INTO lists (name, description, fields_json, settings_json, status, created_ts, modified_ts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                list.name,
                list.description,
                serde_json::to_string(&list.fields)?,
                serde_json::to_string(&list.settings)?,
                list.status.as_str(),
                list.created_ts,
                list.modified_ts
            ],
        )
        .with_context(|| format!("Failed to create list: {}", name))?;

        let id = conn.last_insert_rowid();
        log::info!("created list '{}' ({}) with {} fields", name, id, fields.len());
        Ok(LeadList { id: Some(id), ..list })
    }

    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<LeadList>> {
        let sql = format!("SELECT {} FROM lists WHERE id = ?1", LIST_COLUMNS);
        Ok(conn.query_row(&sql, [id], list_from_row).optional()?)
    }

    pub fn get_by_name(conn: &Connection, name: &str) -> Result<Option<LeadList>> {
        let sql = format!("SELECT {} FROM lists WHERE name = ?1", LIST_COLUMNS);
        Ok(conn.query_row(&sql, [name], list_from_row).optional()?)
    }

    /// Look a list up by numeric id or by name
    pub fn resolve(conn: &Connection, id_or_name: &str) -> Result<LeadList> {
        let by_id = match id_or_name.parse::<i64>() {
            Ok(id) => Self::get_by_id(conn, id)?,
            Err(_) => None,
        };
        match by_id {
            Some(list) => Ok(list),
            None => Self::get_by_name(conn, id_or_name)?
                .ok_or_else(|| CrmError::ListNotFound(id_or_name.to_string()).into()),
        }
    }

    /// List lists, newest first
    pub fn list(conn: &Connection, include_archived: bool) -> Result<Vec<LeadList>> {
        let sql = if include_archived {
            format!("SELECT {} FROM lists ORDER BY created_ts DESC, id DESC", LIST_COLUMNS)
        } else {
            format!(
                "SELECT {} FROM lists WHERE status != 'archived' ORDER BY created_ts DESC, id DESC",
                LIST_COLUMNS
            )
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], list_from_row)?;

        let mut lists = Vec::new();
        for row in rows {
            lists.push(row?);
        }
        Ok(lists)
    }

    /// Replace the field schema
    pub fn update_fields(conn: &Connection, list_id: i64, fields: &[ListField]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let updated = conn.execute(
            "UPDATE lists SET fields_json = ?1, modified_ts = ?2 WHERE id = ?3",
            rusqlite::params![serde_json::to_string(fields)?, now, list_id],
        )?;
        if updated == 0 {
            return Err(CrmError::ListNotFound(list_id.to_string()).into());
        }
        Ok(())
    }

    /// Replace the settings bag
    pub fn update_settings(conn: &Connection, list_id: i64, settings: &ListSettings) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let updated = conn.execute(
            "UPDATE lists SET settings_json = ?1, modified_ts = ?2 WHERE id = ?3",
            rusqlite::params![serde_json::to_string(settings)?, now, list_id],
        )?;
        if updated == 0 {
            return Err(CrmError::ListNotFound(list_id.to_string()).into());
        }
        Ok(())
    }

    pub fn set_status(conn: &Connection, list_id: i64, status: ListStatus) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let updated = conn.execute(
            "UPDATE lists SET status = ?1, modified_ts = ?2 WHERE id = ?3",
            rusqlite::params![status.as_str(), now, list_id],
        )?;
        if updated == 0 {
            return Err(CrmError::ListNotFound(list_id.to_string()).into());
        }
        Ok(())
    }

    /// Delete a list and all its leads. Returns the number of leads removed.
    pub fn delete(conn: &Connection, list_id: i64) -> Result<usize> {
        let tx = conn.unchecked_transaction()?;
        let lead_count = tx.execute("DELETE FROM leads WHERE list_id = ?1", [list_id])?;
        let deleted = tx.execute("DELETE FROM lists WHERE id = ?1", [list_id])?;
        if deleted == 0 {
            return Err(CrmError::ListNotFound(list_id.to_string()).into());
        }
        tx.commit()?;
        log::info!("deleted list {} and {} leads", list_id, lead_count);
        Ok(lead_count)
    }

    /// Lead counts per status for one list
    pub fn status_counts(conn: &Connection, list_id: i64) -> Result<HashMap<LeadStatus, usize>> {
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM leads WHERE list_id = ?1 GROUP BY status",
        )?;
        let rows = stmt.query_map([list_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = HashMap::new();
        for row in rows {
            let (status, count) = row?;
            if let Some(status) = LeadStatus::from_str(&status) {
                counts.insert(status, count as usize);
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbConnection;
    use crate::models::FieldKind;
    use crate::repo::LeadRepo;
    use serde_json::Map;

    #[test]
    fn test_create_roundtrips_schema() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let fields = vec![
            ListField::new("Company", FieldKind::Text),
            ListField::new("Phone", FieldKind::Phone),
        ];
        let list = ListRepo::create(&conn, "Vilnius", Some("SMB"), &fields).unwrap();
        let loaded = ListRepo::get_by_id(&conn, list.id.unwrap()).unwrap().unwrap();
        assert_eq!(loaded.fields, fields);
        assert_eq!(loaded.description.as_deref(), Some("SMB"));
        assert_eq!(loaded.status, ListStatus::Active);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let conn = DbConnection::connect_in_memory().unwrap();
        ListRepo::create(&conn, "Q1", None, &[]).unwrap();
        assert!(ListRepo::create(&conn, "Q1", None, &[]).is_err());
    }

    #[test]
    fn test_resolve_by_id_or_name() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let list = ListRepo::create(&conn, "Kaunas", None, &[]).unwrap();
        let id = list.id.unwrap();
        assert_eq!(ListRepo::resolve(&conn, &id.to_string()).unwrap().name, "Kaunas");
        assert_eq!(ListRepo::resolve(&conn, "Kaunas").unwrap().id, Some(id));
        let err = ListRepo::resolve(&conn, "Riga").unwrap_err();
        assert_eq!(err.downcast_ref::<CrmError>(), Some(&CrmError::ListNotFound("Riga".into())));
    }

    #[test]
    fn test_settings_and_archive() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let list = ListRepo::create(&conn, "Q1", None, &[]).unwrap();
        let id = list.id.unwrap();

        let mut settings = list.settings.clone();
        settings.set("dedupe_fields", "phone,email").unwrap();
        ListRepo::update_settings(&conn, id, &settings).unwrap();
        ListRepo::set_status(&conn, id, ListStatus::Archived).unwrap();

        let loaded = ListRepo::get_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(loaded.settings.dedupe_fields, vec!["phone", "email"]);
        assert!(ListRepo::list(&conn, false).unwrap().is_empty());
        assert_eq!(ListRepo::list(&conn, true).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_removes_leads() {
        let conn = DbConnection::connect_in_memory().unwrap();
        let list = ListRepo::create(&conn, "Q1", None, &[]).unwrap();
        let id = list.id.unwrap();
        LeadRepo::create(&conn, Map::new(), Some(id), None).unwrap();
        LeadRepo::create(&conn, Map::new(), Some(id), None).unwrap();
        LeadRepo::create(&conn, Map::new(), None, None).unwrap();

        assert_eq!(ListRepo::status_counts(&conn, id).unwrap().get(&LeadStatus::New), Some(&2));
        assert_eq!(ListRepo::delete(&conn, id).unwrap(), 2);
        assert!(ListRepo::get_by_id(&conn, id).unwrap().is_none());
        assert!(ListRepo::delete(&conn, id).is_err());
    }
}

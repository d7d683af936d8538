use crate::models::AddressLabel;
use sqlx::{Pool, Row, Sqlite};

/// Insert a label, or refresh label, category and last_seen of an existing
/// one. `first_seen` and `known_entity` keep their original values.
pub async fn upsert_address_label(pool: &Pool<Sqlite>, label: &AddressLabel) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO address_labels (address, label, category, known_entity, first_seen, last_seen)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(address) DO UPDATE SET
             label = excluded.label,
             category = excluded.category,
             last_seen = excluded.last_seen",
    )
    .bind(label.address.to_lowercase())
    .bind(label.label.as_str())
    .bind(label.category.as_str())
    .bind(label.known_entity)
    .bind(label.first_seen)
    .bind(label.last_seen)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_address_label(pool: &Pool<Sqlite>, address: &str) -> Result<Option<AddressLabel>, sqlx::Error> {
    let row = sqlx::query(
        "SELECT address, label, category, known_entity, first_seen, last_seen
         FROM address_labels WHERE address = ?",
    )
    .bind(address.to_lowercase())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(AddressLabel {
        address: row.try_get("address")?,
        label: row.try_get("label")?,
        category: row.try_get("category")?,
        known_entity: row.try_get("known_entity")?,
        first_seen: row.try_get("first_seen")?,
        last_seen: row.try_get("last_seen")?,
    }))
}

//! Catalogue of storage collections and the columns callers may filter or sort on.

use serde::{Deserialize, Serialize};

use super::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Uuid,
    Text,
    TextArray,
    Integer,
    Json,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn col(name: &'static str, kind: ColumnKind) -> Column {
    Column { name, kind }
}

const CLIENT_COLUMNS: &[Column] = &[
    col("id", ColumnKind::Uuid),
    col("name", ColumnKind::Text),
    col("industry", ColumnKind::Text),
    col("website", ColumnKind::Text),
    col("description", ColumnKind::Text),
    col("created_at", ColumnKind::Timestamp),
    col("updated_at", ColumnKind::Timestamp),
];

const COMPETITOR_COLUMNS: &[Column] = &[
    col("id", ColumnKind::Uuid),
    col("client_id", ColumnKind::Uuid),
    col("name", ColumnKind::Text),
    col("website", ColumnKind::Text),
    col("platform", ColumnKind::Text),
    col("tags", ColumnKind::TextArray),
    col("notes", ColumnKind::Text),
    col("created_at", ColumnKind::Timestamp),
];

const SAVED_IDEA_COLUMNS: &[Column] = &[
    col("id", ColumnKind::Uuid),
    col("client_id", ColumnKind::Uuid),
    col("title", ColumnKind::Text),
    col("content", ColumnKind::Json),
    col("tags", ColumnKind::TextArray),
    col("share_token", ColumnKind::Text),
    col("created_at", ColumnKind::Timestamp),
    col("updated_at", ColumnKind::Timestamp),
];

const FEEDBACK_COLUMNS: &[Column] = &[
    col("id", ColumnKind::Uuid),
    col("client_id", ColumnKind::Uuid),
    col("idea_id", ColumnKind::Uuid),
    col("rating", ColumnKind::Integer),
    col("comment", ColumnKind::Text),
    col("created_at", ColumnKind::Timestamp),
];

const COMPETITOR_DEDUP_KEY: &[&str] = &["client_id", "name"];

/// What happens to referencing rows when the referenced row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    Cascade,
    SetNull,
}

/// A column in `child` holding the id of a row in another collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub child: Collection,
    pub column: &'static str,
    pub on_delete: OnDelete,
}

const fn reference(child: Collection, column: &'static str, on_delete: OnDelete) -> Reference {
    Reference {
        child,
        column,
        on_delete,
    }
}

const CLIENT_REFERENCES: &[Reference] = &[
    reference(Collection::Competitors, "client_id", OnDelete::Cascade),
    reference(Collection::SavedIdeas, "client_id", OnDelete::Cascade),
    reference(Collection::Feedback, "client_id", OnDelete::Cascade),
];

const SAVED_IDEA_REFERENCES: &[Reference] =
    &[reference(Collection::Feedback, "idea_id", OnDelete::SetNull)];

/// Named record collection in the storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Clients,
    Competitors,
    SavedIdeas,
    Feedback,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Clients,
        Collection::Competitors,
        Collection::SavedIdeas,
        Collection::Feedback,
    ];

    pub fn table(self) -> &'static str {
        match self {
            Collection::Clients => "clients",
            Collection::Competitors => "competitors",
            Collection::SavedIdeas => "saved_ideas",
            Collection::Feedback => "feedback",
        }
    }

    pub fn columns(self) -> &'static [Column] {
        match self {
            Collection::Clients => CLIENT_COLUMNS,
            Collection::Competitors => COMPETITOR_COLUMNS,
            Collection::SavedIdeas => SAVED_IDEA_COLUMNS,
            Collection::Feedback => FEEDBACK_COLUMNS,
        }
    }

    pub fn column(self, name: &str) -> Result<Column, DomainError> {
        self.columns()
            .iter()
            .copied()
            .find(|column| column.name == name)
            .ok_or_else(|| DomainError::UnknownColumn {
                collection: self.table(),
                column: name.to_string(),
            })
    }

    /// Columns that must be unique together; inserts colliding on them are skipped.
    pub fn dedup_key(self) -> Option<&'static [&'static str]> {
        match self {
            Collection::Competitors => Some(COMPETITOR_DEDUP_KEY),
            _ => None,
        }
    }

    /// Foreign keys pointing at this collection, mirroring the migration.
    pub fn referenced_by(self) -> &'static [Reference] {
        match self {
            Collection::Clients => CLIENT_REFERENCES,
            Collection::SavedIdeas => SAVED_IDEA_REFERENCES,
            Collection::Competitors | Collection::Feedback => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_collection_has_an_id_column() {
        for collection in Collection::ALL {
            let id = collection.column("id").expect("id column");
            assert_eq!(id.kind, ColumnKind::Uuid);
        }
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let err = Collection::Clients
            .column("name; DROP TABLE clients")
            .expect_err("must reject");
        assert!(matches!(err, DomainError::UnknownColumn { collection: "clients", .. }));
    }

    #[test]
    fn references_name_known_columns() {
        for parent in Collection::ALL {
            for reference in parent.referenced_by() {
                let column = reference.child.column(reference.column).expect("column");
                assert_eq!(column.kind, ColumnKind::Uuid);
            }
        }
    }

    #[test]
    fn competitors_dedup_on_client_and_name() {
        assert_eq!(
            Collection::Competitors.dedup_key(),
            Some(&["client_id", "name"][..])
        );
        assert!(Collection::Clients.dedup_key().is_none());
    }
}

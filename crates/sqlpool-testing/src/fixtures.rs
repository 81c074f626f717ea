//! Test fixture utilities.

/// A set of tables a test creates up front and drops afterwards.
#[derive(Debug, Clone, Default)]
pub struct TestFixture {
    /// Table names and column definitions, in creation order.
    pub tables: Vec<(String, String)>,
}

impl TestFixture {
    /// Create an empty fixture.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table with the given column definitions.
    #[must_use]
    pub fn with_table(mut self, name: impl Into<String>, columns: impl Into<String>) -> Self {
        self.tables.push((name.into(), columns.into()));
        self
    }

    /// SQL creating every table, one statement per table.
    #[must_use]
    pub fn create_sql(&self) -> String {
        self.tables
            .iter()
            .map(|(name, columns)| format!("CREATE TABLE IF NOT EXISTS {name} ({columns});"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// SQL dropping every table in reverse creation order.
    #[must_use]
    pub fn drop_sql(&self) -> String {
        self.tables
            .iter()
            .rev()
            .map(|(name, _)| format!("DROP TABLE IF EXISTS {name};"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_sql() {
        let fixture = TestFixture::new()
            .with_table("users", "id INTEGER PRIMARY KEY, name TEXT")
            .with_table("orders", "id INTEGER PRIMARY KEY, user_id INTEGER");

        assert_eq!(
            fixture.create_sql(),
            "CREATE TABLE IF NOT EXISTS users (id INTEGER PRIMARY KEY, name TEXT);\n\
             CREATE TABLE IF NOT EXISTS orders (id INTEGER PRIMARY KEY, user_id INTEGER);"
        );
        assert_eq!(
            fixture.drop_sql(),
            "DROP TABLE IF EXISTS orders;\nDROP TABLE IF EXISTS users;"
        );
    }
}

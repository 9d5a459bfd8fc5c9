//! SOQL query construction.

/// Builds a SOQL statement from a table name, field list and optional
/// clauses.
///
/// Field additions are idempotent: duplicates are dropped at render time,
/// preserving first-seen order. No validation of field or table names
/// happens here; queryability filtering is the schema introspector's job
/// upstream.
#[derive(Debug, Clone)]
pub struct SoqlBuilder {
    table_name: String,
    fields: Vec<String>,
    where_clause: String,
    order_by: String,
    limit: String,
}

impl SoqlBuilder {
    /// Creates a builder for the given table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table_name: table.into(),
            fields: Vec::new(),
            where_clause: String::new(),
            order_by: String::new(),
            limit: String::new(),
        }
    }

    /// Adds the `Id` field.
    pub fn with_id(&mut self) -> &mut Self {
        self.fields.push("Id".to_string());
        self
    }

    /// Adds the default metadata fields, `CreatedDate` and
    /// `LastModifiedDate`.
    pub fn with_default_metafields(&mut self) -> &mut Self {
        self.fields.push("CreatedDate".to_string());
        self.fields.push("LastModifiedDate".to_string());
        self
    }

    /// Adds an arbitrary list of fields.
    pub fn with_fields<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Sets the WHERE clause body.
    pub fn with_where(&mut self, condition: impl AsRef<str>) -> &mut Self {
        self.where_clause = format!("WHERE {}", condition.as_ref());
        self
    }

    /// Sets the ORDER BY clause body.
    pub fn with_order_by(&mut self, ordering: impl AsRef<str>) -> &mut Self {
        self.order_by = format!("ORDER BY {}", ordering.as_ref());
        self
    }

    /// Sets the LIMIT clause.
    pub fn with_limit(&mut self, limit: u32) -> &mut Self {
        self.limit = format!("LIMIT {limit}");
        self
    }

    /// Embeds a fully-built sub-query as a parenthesized field.
    pub fn with_join(&mut self, subquery: impl AsRef<str>) -> &mut Self {
        self.fields.push(format!("(\n{})\n", subquery.as_ref()));
        self
    }

    /// Renders the query, omitting empty clause lines.
    #[must_use]
    pub fn build(&self) -> String {
        let mut seen = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            if !seen.contains(field) {
                seen.push(field.clone());
            }
        }
        let select_columns = seen.join(",\n");

        let query_lines = [
            format!("SELECT {select_columns}"),
            format!("FROM {}", self.table_name),
            self.where_clause.clone(),
            self.order_by.clone(),
            self.limit.clone(),
        ];

        query_lines
            .iter()
            .filter(|line| !line.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }
}

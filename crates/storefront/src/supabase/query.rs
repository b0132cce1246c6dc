//! Row filter builder for the REST endpoint.
//!
//! Renders to the backend's query-string dialect:
//!
//! ```text
//! ?select=id,quantity,variant:product_variants(price)&user_id=eq.<uuid>&order=created_at.desc&limit=1
//! ```

/// A REST query: column selection, equality filters, ordering, and limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    select: Option<String>,
    filters: Vec<(String, String)>,
    order: Option<(String, bool)>,
    limit: Option<u32>,
    on_conflict: Option<String>,
}

impl Query {
    /// An empty query (all columns, all rows).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Columns (and embedded resources) to return.
    #[must_use]
    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(compact_select(columns));
        self
    }

    /// Keep rows where `column = value`.
    #[must_use]
    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    /// Keep rows where `column` is one of `values`.
    #[must_use]
    pub fn in_list<I, V>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let joined = values
            .into_iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.filters
            .push((column.to_string(), format!("in.({joined})")));
        self
    }

    /// Order by `column`.
    #[must_use]
    pub fn order(mut self, column: &str, descending: bool) -> Self {
        self.order = Some((column.to_string(), descending));
        self
    }

    /// Return at most `n` rows.
    #[must_use]
    pub const fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    /// Conflict target for upserts.
    #[must_use]
    pub fn on_conflict(mut self, columns: &str) -> Self {
        self.on_conflict = Some(columns.to_string());
        self
    }

    /// Whether the query has any row filter.
    ///
    /// Updates and deletes refuse to run unfiltered.
    #[must_use]
    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    /// Query-string pairs in a stable order.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.filters.len() + 4);

        if let Some(select) = &self.select {
            pairs.push(("select".to_string(), select.clone()));
        }
        pairs.extend(self.filters.iter().cloned());
        if let Some((column, descending)) = &self.order {
            let direction = if *descending { "desc" } else { "asc" };
            pairs.push(("order".to_string(), format!("{column}.{direction}")));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(on_conflict) = &self.on_conflict {
            pairs.push(("on_conflict".to_string(), on_conflict.clone()));
        }

        pairs
    }
}

/// Strip whitespace so multi-line select lists can be written readably.
fn compact_select(columns: &str) -> String {
    columns.chars().filter(|c| !c.is_whitespace()).collect()
}

//! Filter builder for the backend's REST query syntax.
//!
//! `Query::new().select("id,name").eq("event_id", "e1").order("created_at", true).limit(50)`
//! becomes `select=id,name&event_id=eq.e1&order=created_at.asc&limit=50`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gte,
    Lte,
    IsNull,
}

impl FilterOp {
    fn prefix(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Gte => "gte",
            FilterOp::Lte => "lte",
            FilterOp::IsNull => "is",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub select: Option<String>,
    pub filters: Vec<Filter>,
    /// Column and ascending flag.
    pub order: Option<(String, bool)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.select = Some(columns.to_string());
        self
    }

    pub fn eq(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, FilterOp::Eq, value.to_string())
    }

    pub fn neq(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, FilterOp::Neq, value.to_string())
    }

    pub fn gte(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, FilterOp::Gte, value.to_string())
    }

    pub fn lte(self, column: &str, value: impl ToString) -> Self {
        self.filter(column, FilterOp::Lte, value.to_string())
    }

    pub fn is_null(self, column: &str) -> Self {
        self.filter(column, FilterOp::IsNull, "null".to_string())
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some((column.to_string(), ascending));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn filter(mut self, column: &str, op: FilterOp, value: String) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            op,
            value,
        });
        self
    }

    /// Key/value pairs ready for `Url::query_pairs_mut`.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.filters.len() + 3);
        if let Some(select) = &self.select {
            pairs.push(("select".to_string(), select.clone()));
        }
        for f in &self.filters {
            pairs.push((f.column.clone(), format!("{}.{}", f.op.prefix(), f.value)));
        }
        if let Some((column, ascending)) = &self.order {
            let dir = if *ascending { "asc" } else { "desc" };
            pairs.push(("order".to_string(), format!("{}.{}", column, dir)));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }
}

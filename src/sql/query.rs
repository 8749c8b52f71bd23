use bson::Bson;
use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use super::dialect::{Dialect, Postgres};
use crate::ast::Field;
use crate::errors::QueryError;

/// Decides whether a relation path becomes a join. Receives the relation path and
/// the caller's host object, if any.
pub type JoinRelationFn = Arc<dyn Fn(&str, Option<&dyn Any>) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct SqlOptions {
    pub dialect: Arc<dyn Dialect>,
    pub join_relation: JoinRelationFn,
    /// Alias prepended to columns of the root table: `"alias"."column"`.
    pub root_alias: Option<String>,
}

impl Default for SqlOptions {
    fn default() -> Self {
        Self::new(Arc::new(Postgres))
    }
}

impl SqlOptions {
    pub fn new(dialect: Arc<dyn Dialect>) -> Self {
        Self { dialect, join_relation: Arc::new(|_, _| false), root_alias: None }
    }

    pub fn with_join_relation<F>(mut self, join_relation: F) -> Self
    where
        F: Fn(&str, Option<&dyn Any>) -> bool + Send + Sync + 'static,
    {
        self.join_relation = Arc::new(join_relation);
        self
    }

    /// Join exactly the listed relations.
    pub fn with_joins<I, S>(self, relations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let relations: Vec<String> = relations.into_iter().map(Into::into).collect();
        self.with_join_relation(move |relation, _| relations.iter().any(|r| r == relation))
    }

    pub fn with_root_alias(mut self, alias: impl Into<String>) -> Self {
        self.root_alias = Some(alias.into());
        self
    }
}

impl fmt::Debug for SqlOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlOptions")
            .field("dialect", &self.dialect.name())
            .field("root_alias", &self.root_alias)
            .finish_non_exhaustive()
    }
}

/// Result of rendering a condition: a `where` fragment, its bound parameters in
/// placeholder order and the relations that must be joined.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SqlOutput {
    pub sql: String,
    pub params: Vec<Bson>,
    pub joins: Vec<String>,
}

/// Mutable SQL builder threaded through the operator functions of one invocation.
pub struct Query {
    options: SqlOptions,
    host: Option<Rc<dyn Any>>,
    field_prefix: String,
    root_alias: String,
    sql: Vec<String>,
    params: Vec<Bson>,
    joins: Vec<String>,
    last_placeholder_index: usize,
    linked: bool,
}

impl Query {
    pub fn new(options: SqlOptions, host: Option<Rc<dyn Any>>) -> Self {
        let root_alias = options
            .root_alias
            .as_deref()
            .map(|alias| format!("{}.", options.dialect.escape_field(alias)))
            .unwrap_or_default();
        Self {
            options,
            host,
            field_prefix: String::new(),
            root_alias,
            sql: Vec::new(),
            params: Vec::new(),
            joins: Vec::new(),
            last_placeholder_index: 1,
            linked: false,
        }
    }

    pub fn options(&self) -> &SqlOptions {
        &self.options
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.options.dialect.as_ref()
    }

    pub fn field_prefix(&self) -> &str {
        &self.field_prefix
    }

    /// Swap the field prefix, returning the previous one so it can be restored.
    pub fn replace_field_prefix(&mut self, prefix: String) -> String {
        std::mem::replace(&mut self.field_prefix, prefix)
    }

    /// Render a field reference, recording a join when the relation is accepted.
    ///
    /// # Errors
    /// `InvalidQuery` when `field` is the "itself" marker outside of a prefixed scope.
    pub fn field(&mut self, field: &Field) -> Result<String, QueryError> {
        let name = match field {
            Field::Named(name) => format!("{}{name}", self.field_prefix),
            Field::Itself => match self.field_prefix.strip_suffix('.') {
                Some(prefix) if !prefix.is_empty() => prefix.to_string(),
                _ => {
                    return Err(QueryError::InvalidQuery(
                        "cannot reference the value itself outside of elemMatch".to_string(),
                    ));
                }
            },
        };

        let Some((relation, column)) = name.rsplit_once('.') else {
            return Ok(format!("{}{}", self.root_alias, self.dialect().escape_field(&name)));
        };

        let host = self.host.as_deref();
        if !(self.options.join_relation)(relation, host) {
            return Ok(self.dialect().escape_field(column));
        }

        log::trace!(target: "querycast::sql", "joining relation {relation}");
        self.add_join(relation);
        Ok(format!("{}.{}", self.dialect().escape_field(relation), self.dialect().escape_field(column)))
    }

    fn add_join(&mut self, relation: &str) {
        if !self.joins.iter().any(|j| j == relation) {
            self.joins.push(relation.to_string());
        }
    }

    fn next_index(&self) -> usize {
        self.last_placeholder_index + self.params.len()
    }

    /// Placeholder for the next parameter to be bound.
    pub fn param(&self) -> String {
        self.dialect().param_placeholder(self.next_index())
    }

    /// Placeholders for the next `count` parameters.
    pub fn many_params(&self, count: usize) -> Vec<String> {
        let start = self.next_index();
        (start..start + count).map(|index| self.dialect().param_placeholder(index)).collect()
    }

    /// A fresh query whose placeholders continue after this one's.
    pub fn child(&self) -> Self {
        let mut child = Self::new(self.options.clone(), self.host.clone());
        child.field_prefix = self.field_prefix.clone();
        child.last_placeholder_index = self.next_index();
        child
    }

    /// A child that takes over this query's parameters; they come back on merge.
    pub fn linked_child(&mut self) -> Self {
        let mut child = Self::new(self.options.clone(), self.host.clone());
        child.field_prefix = self.field_prefix.clone();
        child.last_placeholder_index = self.last_placeholder_index;
        child.params = std::mem::take(&mut self.params);
        child.linked = true;
        child
    }

    /// `<field> <operator> <placeholder>` with `value` bound.
    pub fn where_op(&mut self, field: &Field, operator: &str, value: Bson) -> Result<&mut Self, QueryError> {
        let field = self.field(field)?;
        let sql = format!("{field} {operator} {}", self.param());
        Ok(self.where_raw(sql, [value]))
    }

    pub fn where_raw(&mut self, sql: impl Into<String>, values: impl IntoIterator<Item = Bson>) -> &mut Self {
        self.sql.push(sql.into());
        self.params.extend(values);
        self
    }

    /// Fold a child's fragments into this query as one group.
    pub fn merge(&mut self, child: Query, combinator: &str, inverted: bool) -> &mut Self {
        let Query { sql, params, joins, linked, .. } = child;

        if linked {
            self.params = params;
        } else {
            self.params.extend(params);
        }
        for relation in &joins {
            self.add_join(relation);
        }

        if sql.is_empty() {
            return self;
        }

        let separator = format!(" {combinator} ");
        let mut group = sql.join(separator.as_str());
        if !is_single_group(&group) {
            group = format!("({group})");
        }
        self.sql.push(if inverted { format!("not {group}") } else { group });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    pub fn into_output(self) -> SqlOutput {
        SqlOutput { sql: self.sql.join(" and "), params: self.params, joins: self.joins }
    }
}

/// True when `sql` is wrapped by one pair of parentheses that match each other.
fn is_single_group(sql: &str) -> bool {
    if !sql.starts_with('(') || !sql.ends_with(')') {
        return false;
    }
    let mut depth = 0usize;
    for (i, ch) in sql.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i + 1 < sql.len() {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pg() -> SqlOptions {
        SqlOptions::default()
    }

    #[test]
    fn single_group_detection() {
        assert!(is_single_group("(a and b)"));
        assert!(is_single_group("((a) or (b))"));
        assert!(!is_single_group("(a) or (b)"));
        assert!(!is_single_group("a = 1"));
    }

    #[test]
    fn placeholders_continue_into_children() {
        let mut query = Query::new(pg(), None);
        query.where_op(&Field::from("a"), "=", Bson::Int32(1)).unwrap();
        let child = query.child();
        assert_eq!(child.param(), "$2");
        assert_eq!(query.many_params(2), vec!["$2", "$3"]);
    }

    #[test]
    fn linked_child_returns_parameters_on_merge() {
        let mut query = Query::new(pg(), None);
        query.where_op(&Field::from("a"), "=", Bson::Int32(1)).unwrap();
        let mut child = query.linked_child();
        assert!(query.params.is_empty());
        child.where_op(&Field::from("b"), "=", Bson::Int32(2)).unwrap();
        child.where_op(&Field::from("c"), "=", Bson::Int32(3)).unwrap();
        query.merge(child, "or", false);

        let out = query.into_output();
        assert_eq!(out.sql, "\"a\" = $1 and (\"b\" = $2 or \"c\" = $3)");
        assert_eq!(out.params, vec![Bson::Int32(1), Bson::Int32(2), Bson::Int32(3)]);
    }

    #[test]
    fn empty_child_merges_to_nothing() {
        let mut query = Query::new(pg(), None);
        let child = query.child();
        query.merge(child, "and", true);
        assert!(query.is_empty());
        assert_eq!(query.into_output().sql, "");
    }

    #[test]
    fn root_alias_prefixes_local_fields_only() {
        let options = pg().with_root_alias("u").with_joins(["projects"]);
        let mut query = Query::new(options, None);
        assert_eq!(query.field(&Field::from("name")).unwrap(), "\"u\".\"name\"");
        assert_eq!(query.field(&Field::from("projects.name")).unwrap(), "\"projects\".\"name\"");
    }

    #[test]
    fn declined_relation_renders_bare_column() {
        let mut query = Query::new(pg(), None);
        assert_eq!(query.field(&Field::from("address.city")).unwrap(), "\"city\"");
        assert!(query.into_output().joins.is_empty());
    }

    #[test]
    fn relation_path_splits_at_last_separator() {
        let options = pg().with_joins(["author.profile"]);
        let mut query = Query::new(options, None);
        assert_eq!(
            query.field(&Field::from("author.profile.bio")).unwrap(),
            "\"author.profile\".\"bio\""
        );
        assert_eq!(query.into_output().joins, vec!["author.profile"]);
    }

    #[test]
    fn host_is_passed_to_join_relation() {
        let options = pg().with_join_relation(|relation, host| {
            host.and_then(|h| h.downcast_ref::<Vec<&'static str>>())
                .is_some_and(|allowed| allowed.iter().any(|a| *a == relation))
        });
        let host: Rc<dyn Any> = Rc::new(vec!["tags"]);
        let mut query = Query::new(options, Some(host));
        assert_eq!(query.field(&Field::from("tags.name")).unwrap(), "\"tags\".\"name\"");
        assert_eq!(query.field(&Field::from("owner.name")).unwrap(), "\"name\"");
    }

    #[test]
    fn itself_requires_prefix() {
        let mut query = Query::new(pg(), None);
        assert!(query.field(&Field::Itself).is_err());
        query.replace_field_prefix("tags.".into());
        assert_eq!(query.field(&Field::Itself).unwrap(), "\"tags\"");
    }
}

//! The query compiler: reference resolution, planning, and SELECT emission.
//!
//! All caller-supplied values are parameterized; the emitted SQL text only
//! ever contains identifiers, keywords, and `?` markers.

pub mod ddl;

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::ast::{
    Constraint, ConstraintTest, Expression, Operator, SourceKey, SourceRef, SrcKey, Syntax, Value,
};
use crate::error::{EqlError, EqlResult, Pos, SyntaxCause, SyntaxError};
use crate::graph::Plan;
use crate::name;
use crate::schema::{Sources, SOURCE_STUB_KEY};
use crate::value::EqlValue;

/// A compiled statement: parameterized SQL plus its argument vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub query: String,
    pub args: Vec<EqlValue>,
}

/// A reference resolved against the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRef {
    /// The owning source's config name.
    pub source: String,
    /// The physical table name.
    pub table: String,
    /// The snake-cased column key.
    pub key: String,
    /// Whether the owning source appears in the projection.
    pub in_projection: bool,
}

/// Inject the stub projection for `QUERY` statements; validates first.
fn normalize(sources: &Sources, syntax: &Syntax) -> EqlResult<Syntax> {
    syntax.validate()?;
    let mut syntax = syntax.clone();
    if syntax.query {
        let primary = sources
            .primary()
            .ok_or_else(|| EqlError::SourceNotFound(String::new()))?;
        if primary.column(SOURCE_STUB_KEY).is_none() {
            return Err(EqlError::QueryRequiresStub);
        }
        let mut key = SourceKey::new(Some(primary.name().to_string()), SOURCE_STUB_KEY);
        key.pos = syntax.pos;
        syntax.keys = vec![key];
    }
    Ok(syntax)
}

/// Resolve every reference in the statement to a schema column. Keys in the
/// returned map are the canonical textual forms (`src.key`, `.key`, and any
/// aliases), as they appear in the statement.
pub fn resolve(sources: &Sources, syntax: &Syntax) -> EqlResult<BTreeMap<String, ResolvedRef>> {
    let primary = sources
        .primary()
        .ok_or_else(|| EqlError::SourceNotFound(String::new()))?
        .name()
        .to_string();

    let mut projected: HashSet<String> = HashSet::new();
    let mut aliased: HashMap<String, SrcKey> = HashMap::new();
    for sk in &syntax.keys {
        let src = match &sk.source {
            Some(src) if !src.is_empty() => name::snake(src),
            _ => primary.clone(),
        };
        projected.insert(src);
        if let Some(alias) = &sk.alias {
            aliased.insert(alias.clone(), sk.as_key());
        }
    }

    let mut refs: BTreeMap<String, ResolvedRef> = BTreeMap::new();
    for mut found in syntax.find_sources() {
        if !found.alias.is_empty() {
            match aliased.get(&found.alias) {
                Some(target) => {
                    found.src = target.src.clone();
                    found.key = target.key.clone();
                }
                None => {
                    return Err(SyntaxError::new(
                        syntax.pos,
                        SyntaxCause::UnknownAlias(found.alias.clone()),
                    )
                    .into())
                }
            }
        }

        let src = if found.src.is_empty() {
            primary.clone()
        } else {
            name::snake(&found.src)
        };
        let key = name::snake(&found.key);

        let source = sources
            .get(&src)
            .ok_or_else(|| EqlError::TableNotFound(found.src.clone()))?;
        let column = source.column(&key).ok_or_else(|| EqlError::ColumnNotFound {
            table: sources.formal(&src, &[]),
            key: found.key.clone(),
        })?;

        let entry = ResolvedRef {
            source: src.clone(),
            table: sources.formal(&src, &[]),
            key: column.key.clone(),
            in_projection: projected.contains(&src),
        };
        refs.insert(found.to_string(), entry);
    }

    Ok(refs)
}

/// The distinct source names a statement touches, in deterministic
/// (sorted-reference) order.
pub fn required_sources(refs: &BTreeMap<String, ResolvedRef>) -> Vec<String> {
    let mut required = Vec::new();
    for entry in refs.values() {
        if !required.contains(&entry.source) {
            required.push(entry.source.clone());
        }
    }
    required
}

/// Resolve, then compute the join plan for a statement.
pub fn prepare_plan(sources: &Sources, syntax: &Syntax) -> EqlResult<Plan> {
    let syntax = normalize(sources, syntax)?;
    let refs = resolve(sources, &syntax)?;
    let required = required_sources(&refs);
    sources.graph().plan(&required)
}

struct WhereBuilder<'a> {
    refs: &'a BTreeMap<String, ResolvedRef>,
}

enum Operand {
    Column(String),
    Arg(EqlValue),
}

impl<'a> WhereBuilder<'a> {
    fn column_of(&self, r: &SourceRef) -> EqlResult<String> {
        let textual = r.to_string();
        let entry = self
            .refs
            .get(&textual)
            .ok_or(EqlError::UnknownReference(textual.clone()))?;
        Ok(format!("\"{}\".\"{}\"", entry.table, entry.key))
    }

    fn operand(&self, value: &Value, pos: Pos) -> EqlResult<Operand> {
        Ok(match value {
            Value::Text(s) => Operand::Arg(EqlValue::Text(s.clone())),
            Value::Int(i) => Operand::Arg(EqlValue::Int(*i)),
            Value::Float(f) => Operand::Arg(EqlValue::Float(*f)),
            Value::Bool(b) => Operand::Arg(EqlValue::Bool(*b)),
            Value::Null => Operand::Arg(EqlValue::Null),
            Value::Ref(r) => Operand::Column(self.column_of(r)?),
            Value::Placeholder(n) => {
                return Err(
                    SyntaxError::new(pos, SyntaxCause::ValueType(format!("{{{n}}}"))).into(),
                )
            }
        })
    }

    fn expression(&self, expr: &Expression) -> EqlResult<(String, Vec<EqlValue>)> {
        match expr {
            Expression::Condition(c) => {
                let (left, mut args) = self.expression(&c.left)?;
                let (right, right_args) = self.expression(&c.right)?;
                args.extend(right_args);
                Ok((format!("({left}) {} ({right})", c.op), args))
            }
            Expression::Constraint(c) => self.constraint(c),
        }
    }

    fn constraint(&self, c: &Constraint) -> EqlResult<(String, Vec<EqlValue>)> {
        let col = self.column_of(&c.left)?;
        match &c.test {
            ConstraintTest::In { not, values } => {
                let mut parts = Vec::with_capacity(values.len());
                let mut args = Vec::new();
                for value in values {
                    match self.operand(value, c.pos)? {
                        Operand::Column(s) => parts.push(s),
                        Operand::Arg(a) => {
                            parts.push("?".to_string());
                            args.push(a);
                        }
                    }
                }
                let kw = if *not { "NOT IN" } else { "IN" };
                Ok((format!("{col} {kw} ({})", parts.join(",")), args))
            }
            ConstraintTest::Compare { op, right } => {
                if op.is_string_op() {
                    return self.string_op(&col, *op, right, c.pos);
                }
                let sym = match op {
                    Operator::Eq => "=",
                    Operator::Ne => "<>",
                    Operator::Ge => ">=",
                    Operator::Le => "<=",
                    Operator::Gt => ">",
                    Operator::Lt => "<",
                    _ => unreachable!("string ops handled above"),
                };
                match self.operand(right, c.pos)? {
                    Operand::Column(s) => Ok((format!("{col}{sym}{s}"), vec![])),
                    Operand::Arg(a) => Ok((format!("{col}{sym}?"), vec![a])),
                }
            }
        }
    }

    fn string_op(
        &self,
        col: &str,
        op: Operator,
        right: &Value,
        pos: Pos,
    ) -> EqlResult<(String, Vec<EqlValue>)> {
        let text = match right {
            Value::Text(s) => s.clone(),
            _ => return Err(SyntaxError::new(pos, SyntaxCause::OpStringRequired).into()),
        };
        let like = if op.negated() { "NOT LIKE" } else { "LIKE" };

        let pattern = match op {
            Operator::Like { .. } => text,
            Operator::StartsWith { .. } => format!("{text}%"),
            Operator::EndsWith { .. } => format!("%{text}"),
            Operator::Contains { .. } => format!("%{text}%"),
            Operator::ContainsField { .. } => {
                let fields: Vec<&str> = text.split_whitespace().collect();
                if fields.is_empty() {
                    return Err(SyntaxError::new(pos, SyntaxCause::OpStringRequired).into());
                }
                let sql = fields
                    .iter()
                    .map(|_| format!("{col} {like} ?"))
                    .collect::<Vec<_>>()
                    .join(" OR ");
                let args = fields
                    .iter()
                    .map(|f| EqlValue::Text(format!("%{f}%")))
                    .collect();
                return Ok((sql, args));
            }
            _ => unreachable!("comparison ops handled by caller"),
        };

        Ok((format!("{col} {like} ?"), vec![EqlValue::Text(pattern)]))
    }
}

/// Compile a validated statement into parameterized SQL.
pub fn compile(sources: &Sources, syntax: &Syntax) -> EqlResult<Compiled> {
    let syntax = normalize(sources, syntax)?;
    let refs = resolve(sources, &syntax)?;
    let required = required_sources(&refs);
    let plan = sources.graph().plan(&required)?;
    let builder = WhereBuilder { refs: &refs };

    let projection_column = |sk: &SourceKey| -> EqlResult<(String, Option<String>)> {
        let textual = match &sk.alias {
            Some(alias) => alias.clone(),
            None => sk.as_key().to_string(),
        };
        let entry = refs
            .get(&textual)
            .ok_or(EqlError::UnknownReference(textual.clone()))?;
        Ok((
            format!("\"{}\".\"{}\"", entry.table, entry.key),
            sk.alias.clone(),
        ))
    };

    let mut sql = String::from("SELECT ");
    let mut args: Vec<EqlValue> = Vec::new();

    if syntax.query {
        let (col, _) = projection_column(&syntax.keys[0])?;
        sql.push_str(&col);
    } else if syntax.count || syntax.distinct {
        let (col, alias) = projection_column(&syntax.keys[0])?;
        let rendered = match (syntax.count, syntax.distinct) {
            (true, true) => format!("COUNT(DISTINCT {col})"),
            (true, false) => format!("COUNT({col})"),
            _ => format!("DISTINCT {col}"),
        };
        sql.push_str(&rendered);
        if let Some(alias) = alias {
            sql.push_str(&format!(" AS \"{alias}\""));
        }
    } else {
        for (idx, sk) in syntax.keys.iter().enumerate() {
            if idx > 0 {
                sql.push(',');
            }
            let (col, alias) = projection_column(sk)?;
            sql.push_str(&col);
            if let Some(alias) = alias {
                sql.push_str(&format!(" AS \"{alias}\""));
            }
        }
    }

    sql.push_str(&format!(" FROM \"{}\"", sources.formal(&plan.top, &[])));
    for join in &plan.joins {
        sql.push_str(&format!(
            " INNER JOIN \"{}\" ON \"{}\".\"{}\"=\"{}\".\"{}\"",
            sources.formal(&join.table, &[]),
            sources.formal(&join.left.table, &[]),
            join.left.key,
            sources.formal(&join.right.table, &[]),
            join.right.key,
        ));
    }

    if let Some(within) = &syntax.within {
        let (clause, clause_args) = builder.expression(within)?;
        sql.push_str(" WHERE ");
        sql.push_str(&clause);
        args.extend(clause_args);
    }

    if let Some(order_by) = &syntax.order_by {
        sql.push_str(" ORDER BY ");
        if order_by.random {
            sql.push_str("RANDOM()");
        } else {
            let direction = if order_by.is_desc() { "DESC" } else { "ASC" };
            for (idx, r) in order_by.refs.iter().enumerate() {
                if idx > 0 {
                    sql.push(',');
                }
                sql.push_str(&builder.column_of(r)?);
                sql.push(' ');
                sql.push_str(direction);
            }
        }
    }

    match (syntax.limit, syntax.offset) {
        (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
        (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
        // sqlite requires a LIMIT clause to attach an OFFSET
        (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
        (None, None) => {}
    }

    sql.push(';');
    Ok(Compiled { query: sql, args })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SourceConfig};
    use crate::parser::parse;

    fn be_sources() -> Sources {
        let config = Config::new("be_eql")
            .add_source(
                SourceConfig::new("page")
                    .string_value("shasum", 10)
                    .string_value("language", 10)
                    .string_value("type", 64)
                    .string_value("url", 1736)
                    .string_value("stub", -1)
                    .unique(&["shasum"])
                    .index(&["shasum"]),
            )
            .add_source(
                SourceConfig::new("word")
                    .string_value("letter", 1)
                    .string_value("word", 256),
            )
            .add_source(
                SourceConfig::new("page_words")
                    .parent("page")
                    .linked_value("word", "id")
                    .int_value("hits"),
            );
        Sources::build(&config).unwrap()
    }

    fn to_sql(input: &str) -> Compiled {
        let sources = be_sources();
        let parsed = parse(input).unwrap();
        compile(&sources, &parsed).unwrap()
    }

    #[test]
    fn lookup_with_order() {
        let c = to_sql("LOOKUP .ID, .Shasum ORDER BY .ID");
        assert_eq!(
            c.query,
            "SELECT \"be_eql_page\".\"id\",\"be_eql_page\".\"shasum\" FROM \"be_eql_page\" ORDER BY \"be_eql_page\".\"id\" ASC;"
        );
        assert!(c.args.is_empty());
    }

    #[test]
    fn lookup_with_equality() {
        let c = to_sql("lookup .ID within .Language == 'ja'");
        assert_eq!(
            c.query,
            "SELECT \"be_eql_page\".\"id\" FROM \"be_eql_page\" WHERE \"be_eql_page\".\"language\"=?;"
        );
        assert_eq!(c.args, vec![EqlValue::Text("ja".into())]);
    }

    #[test]
    fn lookup_starts_with() {
        let c = to_sql("lookup .id within .Url ^= \"/pages/\"");
        assert_eq!(
            c.query,
            "SELECT \"be_eql_page\".\"id\" FROM \"be_eql_page\" WHERE \"be_eql_page\".\"url\" LIKE ?;"
        );
        assert_eq!(c.args, vec![EqlValue::Text("/pages/%".into())]);
    }

    #[test]
    fn lookup_ends_with_and_contains() {
        let c = to_sql("lookup .id within .Url $= \".html\"");
        assert!(c.query.ends_with("WHERE \"be_eql_page\".\"url\" LIKE ?;"));
        assert_eq!(c.args, vec![EqlValue::Text("%.html".into())]);

        let c = to_sql("lookup .id within .Url *= \"slug\"");
        assert_eq!(c.args, vec![EqlValue::Text("%slug%".into())]);
    }

    #[test]
    fn lookup_not_contains_fields() {
        let c = to_sql("lookup .id within .Type not ~= \"page blog\"");
        assert_eq!(
            c.query,
            "SELECT \"be_eql_page\".\"id\" FROM \"be_eql_page\" WHERE \"be_eql_page\".\"type\" NOT LIKE ? OR \"be_eql_page\".\"type\" NOT LIKE ?;"
        );
        assert_eq!(
            c.args,
            vec![
                EqlValue::Text("%page%".into()),
                EqlValue::Text("%blog%".into())
            ]
        );
    }

    #[test]
    fn placeholder_compiles_to_parameter() {
        let sources = be_sources();
        let mut parsed = parse(&crate::parser::prepare_syntax(
            "LOOKUP .ID WITHIN .Shasum == {1}",
            &[EqlValue::Text("1234567890".into())],
        ))
        .unwrap();
        parsed
            .apply(&[EqlValue::Text("1234567890".into())])
            .unwrap();
        let c = compile(&sources, &parsed).unwrap();
        assert_eq!(
            c.query,
            "SELECT \"be_eql_page\".\"id\" FROM \"be_eql_page\" WHERE \"be_eql_page\".\"shasum\"=?;"
        );
        assert_eq!(c.args, vec![EqlValue::Text("1234567890".into())]);
    }

    #[test]
    fn cross_source_lookup_joins() {
        let c = to_sql("LOOKUP .Shasum WITHIN word.Word == \"thing\"");
        assert_eq!(
            c.query,
            "SELECT \"be_eql_page\".\"shasum\" FROM \"be_eql_page\" INNER JOIN \"be_eql_page_words\" ON \"be_eql_page\".\"id\"=\"be_eql_page_words\".\"page_id\" INNER JOIN \"be_eql_word\" ON \"be_eql_word\".\"id\"=\"be_eql_page_words\".\"word_id\" WHERE \"be_eql_word\".\"word\"=?;"
        );
        assert_eq!(c.args, vec![EqlValue::Text("thing".into())]);
    }

    #[test]
    fn count_distinct_projections() {
        let c = to_sql("LOOKUP COUNT .shasum");
        assert!(c.query.starts_with("SELECT COUNT(\"be_eql_page\".\"shasum\")"));

        let c = to_sql("LOOKUP DISTINCT .language");
        assert!(c
            .query
            .starts_with("SELECT DISTINCT \"be_eql_page\".\"language\""));

        let c = to_sql("LOOKUP COUNT DISTINCT .language AS n");
        assert!(c
            .query
            .starts_with("SELECT COUNT(DISTINCT \"be_eql_page\".\"language\") AS \"n\""));
    }

    #[test]
    fn alias_projection_and_reference() {
        let c = to_sql("LOOKUP .shasum AS sum WITHIN sum ^= 'abc'");
        assert_eq!(
            c.query,
            "SELECT \"be_eql_page\".\"shasum\" AS \"sum\" FROM \"be_eql_page\" WHERE \"be_eql_page\".\"shasum\" LIKE ?;"
        );
        assert_eq!(c.args, vec![EqlValue::Text("abc%".into())]);
    }

    #[test]
    fn in_lists_parameterize() {
        let c = to_sql("lookup .id within .language IN ('en', 'ja')");
        assert!(c
            .query
            .contains("WHERE \"be_eql_page\".\"language\" IN (?,?);"));
        let c = to_sql("lookup .id within .language NOT IN ('en')");
        assert!(c
            .query
            .contains("WHERE \"be_eql_page\".\"language\" NOT IN (?);"));
    }

    #[test]
    fn conditions_parenthesize() {
        let c = to_sql("lookup .id within (.language == 'en') AND (.type != 'blog')");
        assert!(c.query.contains(
            "WHERE (\"be_eql_page\".\"language\"=?) AND (\"be_eql_page\".\"type\"<>?)"
        ));
        assert_eq!(c.args.len(), 2);
    }

    #[test]
    fn query_projects_stub() {
        let c = to_sql("QUERY WITHIN .language == 'en'");
        assert_eq!(
            c.query,
            "SELECT \"be_eql_page\".\"stub\" FROM \"be_eql_page\" WHERE \"be_eql_page\".\"language\"=?;"
        );
    }

    #[test]
    fn query_without_stub_rejected() {
        let config = Config::new("x").add_source(SourceConfig::new("page").string_value("a", 4));
        let sources = Sources::build(&config).unwrap();
        let parsed = parse("QUERY").unwrap();
        assert!(matches!(
            compile(&sources, &parsed),
            Err(EqlError::QueryRequiresStub)
        ));
    }

    #[test]
    fn unknown_column_rejected() {
        let sources = be_sources();
        let parsed = parse("LOOKUP .nope").unwrap();
        assert!(matches!(
            compile(&sources, &parsed),
            Err(EqlError::ColumnNotFound { .. })
        ));
    }

    #[test]
    fn unknown_source_rejected() {
        let sources = be_sources();
        let parsed = parse("LOOKUP missing.key").unwrap();
        assert!(matches!(
            compile(&sources, &parsed),
            Err(EqlError::TableNotFound(_))
        ));
    }

    #[test]
    fn string_op_requires_string() {
        let sources = be_sources();
        let parsed = parse("LOOKUP .id WITHIN .url ^= 10").unwrap();
        match compile(&sources, &parsed) {
            Err(EqlError::Syntax(e)) => assert_eq!(e.cause, SyntaxCause::OpStringRequired),
            other => panic!("expected OpStringRequired, got {other:?}"),
        }
    }

    #[test]
    fn unbound_placeholder_rejected() {
        let sources = be_sources();
        let parsed = parse("LOOKUP .id WITHIN .shasum == {4}").unwrap();
        match compile(&sources, &parsed) {
            Err(EqlError::Syntax(e)) => {
                assert!(matches!(e.cause, SyntaxCause::ValueType(_)))
            }
            other => panic!("expected ValueType, got {other:?}"),
        }
    }

    #[test]
    fn pagination_forms() {
        let c = to_sql("LOOKUP .id OFFSET 10 LIMIT 5");
        assert!(c.query.ends_with(" LIMIT 5 OFFSET 10;"));
        let c = to_sql("LOOKUP .id OFFSET 10");
        assert!(c.query.ends_with(" LIMIT -1 OFFSET 10;"));
        let c = to_sql("LOOKUP .id LIMIT 5");
        assert!(c.query.ends_with(" LIMIT 5;"));
    }

    #[test]
    fn order_by_random() {
        let c = to_sql("LOOKUP .id ORDER BY RANDOM()");
        assert!(c.query.ends_with(" ORDER BY RANDOM();"));
    }

    #[test]
    fn compile_is_deterministic() {
        let sources = be_sources();
        let parsed = parse("LOOKUP .Shasum, word.Word WITHIN word.Letter == 'a' ORDER BY .id DESC").unwrap();
        let a = compile(&sources, &parsed).unwrap();
        let b = compile(&sources, &parsed).unwrap();
        assert_eq!(a, b);
        assert!(!a.query.contains('{'), "placeholder leaked: {}", a.query);
    }

    #[test]
    fn column_to_column_comparison_inlines() {
        let c = to_sql("LOOKUP .id WITHIN .shasum == .url");
        assert!(c
            .query
            .contains("WHERE \"be_eql_page\".\"shasum\"=\"be_eql_page\".\"url\""));
        assert!(c.args.is_empty());
    }

    #[test]
    fn plan_summaries() {
        let sources = be_sources();
        let parsed = parse("LOOKUP .Shasum WITHIN word.Word == 'x'").unwrap();
        let plan = prepare_plan(&sources, &parsed).unwrap();
        assert_eq!(plan.top, "page");
        assert_eq!(
            plan.brief(),
            "[page, page.id=page_words.page_id, word.id=page_words.word_id]"
        );
        assert!(plan.verbose().contains("TOP\tprimary source\tpage"));
    }
}
